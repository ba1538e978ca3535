// ── Caller-facing payload encoding ──
//
// Every payload a reply stream carries is built here. Tag snapshots are
// flattened into `tag_*` keys and per-read details into parallel
// `perread_*` columns so one payload object can hold a session event
// discriminator, event fields, the tag and its reads side by side.
// Timestamps are epoch milliseconds; byte sequences are lowercase hex.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::codec;
use crate::driver::{Completion, InventoryEvent};
use crate::model::{
    CompletedResult, ConnectionState, DetailedPerReadData, FirmwareUpdateInfo,
    FirmwareUpdateResult, ReaderInfo, SdkInfo, Tag, TagAccessResult,
};

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Serialize a payload, logging and discarding it on failure.
pub fn to_payload<T: Serialize>(what: &'static str, payload: &T) -> Option<Value> {
    match serde_json::to_value(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(payload = what, error = %e, "payload encoding failed, dropping delivery");
            None
        }
    }
}

// ── Tags ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagPayload {
    #[serde(rename = "tag_epc")]
    pub epc: String,
    #[serde(rename = "tag_firstRead")]
    pub first_read: i64,
    #[serde(rename = "tag_tidMemory", skip_serializing_if = "Option::is_none")]
    pub tid_memory: Option<String>,
    #[serde(rename = "tag_userMemory", skip_serializing_if = "Option::is_none")]
    pub user_memory: Option<String>,
    #[serde(rename = "tag_reservedMemory", skip_serializing_if = "Option::is_none")]
    pub reserved_memory: Option<String>,
    #[serde(rename = "tag_isVisible")]
    pub is_visible: bool,
    #[serde(rename = "tag_totalReads")]
    pub total_reads: u32,
    #[serde(rename = "tag_mostRecentRead")]
    pub most_recent_read: i64,
    #[serde(rename = "tag_mostRecentRssiI")]
    pub most_recent_rssi_i: f64,
    #[serde(rename = "tag_mostRecentRssiQ")]
    pub most_recent_rssi_q: f64,
    #[serde(rename = "tag_readHistory", skip_serializing_if = "Option::is_none")]
    pub read_history: Option<Vec<i32>>,
}

impl From<&Tag> for TagPayload {
    fn from(tag: &Tag) -> Self {
        let state = &tag.read_state;
        Self {
            epc: tag.epc.to_string(),
            first_read: millis(tag.first_read),
            tid_memory: codec::encode_hex(tag.tid_memory.as_deref()),
            user_memory: codec::encode_hex(tag.user_memory.as_deref()),
            reserved_memory: codec::encode_hex(tag.reserved_memory.as_deref()),
            is_visible: state.is_visible,
            total_reads: state.total_reads,
            most_recent_read: millis(state.most_recent_read),
            most_recent_rssi_i: state.most_recent_rssi_i,
            most_recent_rssi_q: state.most_recent_rssi_q,
            read_history: state.read_history.clone(),
        }
    }
}

/// Detailed per-read data as parallel columns, one entry per read.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PerReadPayload {
    #[serde(rename = "perread_timestamp")]
    pub timestamp: Vec<i64>,
    #[serde(rename = "perread_frequency")]
    pub frequency: Vec<i32>,
    #[serde(rename = "perread_rssiI")]
    pub rssi_i: Vec<f64>,
    #[serde(rename = "perread_rssiQ")]
    pub rssi_q: Vec<f64>,
    #[serde(rename = "perread_readData1")]
    pub read_data1: Vec<i32>,
    #[serde(rename = "perread_readData2")]
    pub read_data2: Vec<i32>,
}

impl PerReadPayload {
    /// Columns for `details`; `None` when the driver reported none.
    pub fn from_details(details: Option<&[DetailedPerReadData]>) -> Option<Self> {
        let details = details?;
        let mut cols = Self::default();
        for read in details {
            cols.timestamp.push(millis(read.timestamp));
            cols.frequency.push(read.frequency);
            cols.rssi_i.push(read.rssi_i);
            cols.rssi_q.push(read.rssi_q);
            cols.read_data1.push(read.read_data1);
            cols.read_data2.push(read.read_data2);
        }
        Some(cols)
    }
}

// ── Session events ───────────────────────────────────────────────

/// One event on an inventory session stream, discriminated by `_cb`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "_cb", rename_all = "camelCase")]
pub enum SessionEventPayload {
    DidStart,
    DidStop {
        result: CompletedResult,
    },
    TagChanged {
        #[serde(rename = "firstFind")]
        first_find: bool,
        #[serde(flatten)]
        tag: TagPayload,
    },
    TagFound {
        #[serde(flatten)]
        tag: TagPayload,
        #[serde(flatten)]
        per_read: Option<PerReadPayload>,
    },
    TagSubsequentFinds {
        count: i32,
        #[serde(flatten)]
        tag: TagPayload,
        #[serde(flatten)]
        per_read: Option<PerReadPayload>,
    },
    HistoryInterval,
}

impl From<&InventoryEvent> for SessionEventPayload {
    fn from(event: &InventoryEvent) -> Self {
        match event {
            InventoryEvent::Started => Self::DidStart,
            InventoryEvent::Stopped { result } => Self::DidStop { result: *result },
            InventoryEvent::TagChanged { tag, first_find } => Self::TagChanged {
                first_find: *first_find,
                tag: tag.into(),
            },
            InventoryEvent::TagFound { tag, details } => Self::TagFound {
                tag: tag.into(),
                per_read: PerReadPayload::from_details(details.as_deref()),
            },
            InventoryEvent::TagSubsequentFinds {
                tag,
                count,
                details,
            } => Self::TagSubsequentFinds {
                count: *count,
                tag: tag.into(),
                per_read: PerReadPayload::from_details(details.as_deref()),
            },
            InventoryEvent::HistoryInterval => Self::HistoryInterval,
        }
    }
}

// ── One-shot completions ─────────────────────────────────────────

/// Result of a tag access, with the tag snapshot flattened alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagAccessPayload {
    pub result: TagAccessResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(rename = "headerBit", skip_serializing_if = "Option::is_none")]
    pub header_bit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(flatten)]
    pub tag: Option<TagPayload>,
}

impl TagAccessPayload {
    fn new(result: TagAccessResult, tag: Option<&Tag>) -> Self {
        Self {
            result,
            data: None,
            header_bit: None,
            response: None,
            tag: tag.map(TagPayload::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SuccessPayload {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValuePayload {
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionNamesPayload {
    pub region_names: Vec<String>,
    pub selected_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareCheckPayload {
    pub required: bool,
    #[serde(flatten)]
    pub update: Option<FirmwareInfoPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareInfoPayload {
    pub name: String,
    pub notes: String,
    pub software_version_major: i32,
    pub software_version_minor: i32,
    pub software_version_build: i32,
    // Existing callers read this misspelled key.
    #[serde(rename = "sofwareVersionDate")]
    pub software_version_date: i64,
}

impl From<&FirmwareUpdateInfo> for FirmwareInfoPayload {
    fn from(info: &FirmwareUpdateInfo) -> Self {
        Self {
            name: info.name.clone(),
            notes: info.notes.clone(),
            software_version_major: info.software_version_major,
            software_version_minor: info.software_version_minor,
            software_version_build: info.software_version_build,
            software_version_date: millis(info.software_version_date),
        }
    }
}

/// Terminal payload for a one-shot completion.
///
/// `Value::Null` means "success with no payload" (an empty region list).
pub fn completion(completion: &Completion) -> Option<Value> {
    match completion {
        Completion::StopInventory => Some(Value::Null),
        Completion::TagAccess { tag, result } => {
            to_payload("tagAccess", &TagAccessPayload::new(*result, tag.as_ref()))
        }
        Completion::TagRead { tag, data, result } => {
            let payload = TagAccessPayload {
                data: codec::encode_hex(data.as_deref()),
                ..TagAccessPayload::new(*result, tag.as_ref())
            };
            to_payload("readTag", &payload)
        }
        Completion::CustomCommand {
            tag,
            header_bit,
            response,
            result,
        } => {
            let payload = TagAccessPayload {
                header_bit: Some(*header_bit),
                response: codec::encode_hex(response.as_deref()),
                ..TagAccessPayload::new(*result, tag.as_ref())
            };
            to_payload("customCommandToTag", &payload)
        }
        Completion::ChangePower { success }
        | Completion::FirmwareLoaded { success }
        | Completion::RegionSet { success } => to_payload(
            "success",
            &SuccessPayload { success: *success },
        ),
        Completion::FirmwareCheck { update, required } => to_payload(
            "firmwareCheck",
            &FirmwareCheckPayload {
                required: *required,
                update: update.as_ref().map(FirmwareInfoPayload::from),
            },
        ),
        Completion::RegionNames {
            names,
            selected_index,
        } => match names {
            Some(names) => to_payload(
                "regionNames",
                &RegionNamesPayload {
                    region_names: names.clone(),
                    selected_index: *selected_index,
                },
            ),
            None => Some(Value::Null),
        },
    }
}

// ── Firmware update stream ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareProgressPayload {
    pub amount_done: u32,
    pub amount_total: u32,
    pub can_cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FirmwareCompletionPayload {
    pub success: bool,
    pub seconds: u32,
}

impl FirmwareCompletionPayload {
    pub fn new(result: FirmwareUpdateResult, seconds: u32) -> Self {
        Self {
            success: result.is_success(),
            seconds,
        }
    }
}

// ── Connection broadcast ─────────────────────────────────────────

/// Snapshot sent to every connection listener on a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionBroadcast {
    pub state: u8,
    pub is_anything_plugged_into_audio_jack: bool,
    pub required_protocol_version: i32,
    pub supported_protocol_version: i32,
    pub reader_protocol_version: i32,
    pub reader_hardware_model: String,
    pub reader_serial_number: i32,
    pub firmware_version: String,
    pub region_name: String,
    pub num_volume_levels: i32,
    pub battery_capacity: i32,
    #[serde(rename = "batteryCapacity_mAh")]
    pub battery_capacity_mah: i32,
    pub reader_description: String,
}

impl ConnectionBroadcast {
    pub fn new(state: ConnectionState, info: &ReaderInfo) -> Self {
        Self {
            state: state.code(),
            is_anything_plugged_into_audio_jack: info.is_anything_plugged_into_audio_jack,
            required_protocol_version: info.required_protocol_version,
            supported_protocol_version: info.supported_protocol_version,
            reader_protocol_version: info.reader_protocol_version,
            reader_hardware_model: info.reader_hardware_model.clone(),
            reader_serial_number: info.reader_serial_number,
            firmware_version: info.firmware_version(),
            region_name: info.region_name.clone(),
            num_volume_levels: info.num_volume_levels,
            battery_capacity: info.battery_capacity,
            battery_capacity_mah: info.battery_capacity_mah,
            reader_description: info.reader_description.clone(),
        }
    }
}

// ── SDK info ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkInfoPayload {
    pub sdk_version_major: i32,
    pub sdk_version_minor: i32,
    pub sdk_version_build: i32,
    pub sdk_version_date_time: i64,
}

impl From<&SdkInfo> for SdkInfoPayload {
    fn from(info: &SdkInfo) -> Self {
        Self {
            sdk_version_major: info.version_major,
            sdk_version_minor: info.version_minor,
            sdk_version_build: info.version_build,
            sdk_version_date_time: millis(info.version_date_time),
        }
    }
}
