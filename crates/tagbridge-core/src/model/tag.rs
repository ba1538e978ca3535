// ── Tag domain types ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Electronic Product Code, the primary tag identifier.
///
/// Opaque to the bridge: it is carried through exactly as the caller or
/// the driver spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epc(String);

impl Epc {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Epc {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Epc {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Epc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-tag read bookkeeping maintained by the reader driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReadState {
    pub is_visible: bool,
    pub total_reads: u32,
    pub most_recent_read: DateTime<Utc>,
    pub most_recent_rssi_i: f64,
    pub most_recent_rssi_q: f64,
    /// Finds per history interval, most recent first. Bounded by the
    /// configuration's history depth.
    pub read_history: Option<Vec<i32>>,
}

/// A tag as last reported by the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub epc: Epc,
    pub first_read: DateTime<Utc>,
    pub tid_memory: Option<Vec<u8>>,
    pub user_memory: Option<Vec<u8>>,
    pub reserved_memory: Option<Vec<u8>>,
    pub read_state: TagReadState,
}

impl Tag {
    /// A freshly found tag with a single read and no memory contents.
    pub fn first_seen(epc: impl Into<Epc>, at: DateTime<Utc>) -> Self {
        Self {
            epc: epc.into(),
            first_read: at,
            tid_memory: None,
            user_memory: None,
            reserved_memory: None,
            read_state: TagReadState {
                is_visible: true,
                total_reads: 1,
                most_recent_read: at,
                most_recent_rssi_i: 0.0,
                most_recent_rssi_q: 0.0,
                read_history: None,
            },
        }
    }
}

/// Telemetry for one physical read within a reporting window.
///
/// Only produced when the active configuration asks for detailed per-read
/// data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedPerReadData {
    pub timestamp: DateTime<Utc>,
    pub frequency: i32,
    pub rssi_i: f64,
    pub rssi_q: f64,
    pub read_data1: i32,
    pub read_data2: i32,
}
