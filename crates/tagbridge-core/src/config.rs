// ── Runtime bridge configuration ──
//
// Tuning knobs for one bridge instance. Never touches disk; the config
// crate loads it and the binary hands it in.

use serde::{Deserialize, Serialize};

use crate::model::FirmwareChannel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Capacity of the caller command queue.
    pub command_queue_depth: usize,
    /// Channel consulted by automatic firmware update checks.
    pub firmware_channel: FirmwareChannel,
    /// Driver logging status mask applied at startup. 0 = quiet.
    pub logging_status: u32,
    /// Open the reader connection as soon as the bridge starts.
    pub auto_open_connection: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_queue_depth: 64,
            firmware_channel: FirmwareChannel::Release,
            logging_status: 0,
            auto_open_connection: false,
        }
    }
}
