// ── Reader, battery, firmware and SDK descriptors ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Static and connection-dependent properties of the attached reader.
///
/// Snapshotted by the driver with every connection state change; the
/// reader-side values are meaningless until the reader is connected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReaderInfo {
    pub is_anything_plugged_into_audio_jack: bool,
    pub required_protocol_version: i32,
    pub supported_protocol_version: i32,
    pub reader_protocol_version: i32,
    pub reader_hardware_model: String,
    pub reader_serial_number: i32,
    pub firmware_version_major: i32,
    pub firmware_version_minor: i32,
    pub firmware_version_build: i32,
    pub region_name: String,
    pub num_volume_levels: i32,
    /// Battery capacity in minutes of scanning.
    pub battery_capacity: i32,
    pub battery_capacity_mah: i32,
    pub reader_description: String,
}

impl ReaderInfo {
    /// Firmware version as `major.minor.build`.
    pub fn firmware_version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.firmware_version_major, self.firmware_version_minor, self.firmware_version_build
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    pub can_scan: bool,
    pub external_power_is_connected: bool,
    pub is_charging: bool,
    pub minutes_remaining: i32,
    /// Not very accurate while charging.
    pub percent_remaining: i32,
    pub voltage: f64,
}

/// An available firmware update, as announced by the update channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirmwareUpdateInfo {
    pub name: String,
    pub notes: String,
    pub software_version_major: i32,
    pub software_version_minor: i32,
    pub software_version_build: i32,
    pub software_version_date: DateTime<Utc>,
}

/// Version information of the native driver SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkInfo {
    pub version_major: i32,
    pub version_minor: i32,
    pub version_build: i32,
    pub version_date_time: DateTime<Utc>,
}
