// ── Reader driver seam ──
//
// The native reader driver sits behind `ReaderDriver`. Every method
// returns immediately; anything asynchronous comes back later as a
// `HardwareCallback` delivered through the driver's `CallbackHandle`,
// from whatever thread the driver happens to run its I/O on.

use std::fmt;

use tokio::sync::mpsc;
use tracing::trace;

use crate::model::{
    BatteryInfo, CompletedResult, ConnectionState, DetailedPerReadData, Epc, FirmwareChannel,
    FirmwareUpdateInfo, FirmwareUpdateResult, MemoryBank, ReaderInfo, SdkInfo, Tag,
    TagAccessResult,
};
use crate::rfid_config::RfidConfiguration;
use crate::session::TargetEpcs;

// ── Correlation ids ──────────────────────────────────────────────

/// Identifies one native inventory run. Allocated by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InventoryHandle(pub(crate) u64);

impl InventoryHandle {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InventoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inv#{}", self.0)
    }
}

/// Identifies one pending fire-once operation. Allocated by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub(crate) u64);

impl Ticket {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket#{}", self.0)
    }
}

// ── Requests ─────────────────────────────────────────────────────

/// A tag operation issued against a running inventory.
#[derive(Debug, Clone, PartialEq)]
pub enum TagAccessRequest {
    Program {
        old_epc: Epc,
        new_epc: Epc,
        password: u32,
    },
    Write {
        epc: Epc,
        bank: MemoryBank,
        offset: u32,
        data: Vec<u8>,
        /// Expected current contents; the write is refused on mismatch.
        previous: Option<Vec<u8>>,
        password: u32,
    },
    LockUnlock {
        epc: Epc,
        mask_and_action: u32,
        password: u32,
    },
    Read {
        epc: Epc,
        bank: MemoryBank,
        offset: u32,
        min_bytes: u32,
        max_bytes: u32,
    },
    CustomCommand {
        epc: Epc,
        command: Vec<u8>,
        command_bits: u32,
        response_bits_no_header: u32,
        response_bits_with_header: u32,
        receive_timeout_usec: u32,
    },
    ChangePower {
        initial: f64,
        min: f64,
        max: f64,
    },
}

// ── Callbacks ────────────────────────────────────────────────────

/// An event on a running inventory.
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryEvent {
    Started,
    Stopped {
        result: CompletedResult,
    },
    TagChanged {
        tag: Tag,
        first_find: bool,
    },
    TagFound {
        tag: Tag,
        details: Option<Vec<DetailedPerReadData>>,
    },
    TagSubsequentFinds {
        tag: Tag,
        count: i32,
        details: Option<Vec<DetailedPerReadData>>,
    },
    HistoryInterval,
}

impl InventoryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped { .. } => "stopped",
            Self::TagChanged { .. } => "tagChanged",
            Self::TagFound { .. } => "tagFound",
            Self::TagSubsequentFinds { .. } => "tagSubsequentFinds",
            Self::HistoryInterval => "historyInterval",
        }
    }
}

/// Outcome of a fire-once operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    StopInventory,
    /// Program, write or lock/unlock.
    TagAccess {
        tag: Option<Tag>,
        result: TagAccessResult,
    },
    TagRead {
        tag: Option<Tag>,
        data: Option<Vec<u8>>,
        result: TagAccessResult,
    },
    CustomCommand {
        tag: Option<Tag>,
        header_bit: bool,
        response: Option<Vec<u8>>,
        result: TagAccessResult,
    },
    ChangePower {
        success: bool,
    },
    FirmwareCheck {
        update: Option<FirmwareUpdateInfo>,
        required: bool,
    },
    FirmwareLoaded {
        success: bool,
    },
    RegionNames {
        names: Option<Vec<String>>,
        selected_index: i32,
    },
    RegionSet {
        success: bool,
    },
}

/// Everything a driver reports back to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCallback {
    Inventory {
        handle: InventoryHandle,
        event: InventoryEvent,
    },
    Completed {
        ticket: Ticket,
        completion: Completion,
    },
    FirmwareProgress {
        amount_done: u32,
        amount_total: u32,
        can_cancel: bool,
    },
    FirmwareCompleted {
        result: FirmwareUpdateResult,
        seconds: u32,
    },
    /// `reader` is the reader as seen when the change was raised.
    ConnectionStateChanged {
        state: ConnectionState,
        reader: ReaderInfo,
    },
}

// ── CallbackHandle ───────────────────────────────────────────────

/// Hand-off point from driver threads into the bridge executor.
///
/// Cheap to clone and safe to call from any thread. Never blocks.
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    tx: mpsc::UnboundedSender<HardwareCallback>,
}

impl CallbackHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<HardwareCallback>) -> Self {
        Self { tx }
    }

    pub fn deliver(&self, callback: HardwareCallback) {
        if let Err(e) = self.tx.send(callback) {
            trace!(callback = ?e.0, "bridge stopped, dropping hardware callback");
        }
    }

    pub fn inventory(&self, handle: InventoryHandle, event: InventoryEvent) {
        self.deliver(HardwareCallback::Inventory { handle, event });
    }

    pub fn completed(&self, ticket: Ticket, completion: Completion) {
        self.deliver(HardwareCallback::Completed { ticket, completion });
    }

    pub fn connection_state(&self, state: ConnectionState, reader: ReaderInfo) {
        self.deliver(HardwareCallback::ConnectionStateChanged { state, reader });
    }
}

// ── ReaderDriver ─────────────────────────────────────────────────

/// The native reader, as seen by the bridge.
///
/// Owned by the executor task; no method is ever called concurrently.
pub trait ReaderDriver: Send + 'static {
    // Connection
    fn open_connection(&mut self);
    fn close_connection(&mut self);
    fn is_connection_open(&self) -> bool;

    // Inventory
    fn start_inventory(
        &mut self,
        handle: InventoryHandle,
        config: &RfidConfiguration,
        targets: &TargetEpcs,
    );
    /// Stop a run. `ticket`, when present, must be completed with
    /// [`Completion::StopInventory`] once the reader has stopped.
    fn stop_inventory(&mut self, handle: InventoryHandle, ticket: Option<Ticket>);
    fn pause_inventory(&mut self, handle: InventoryHandle);
    fn resume_inventory(&mut self, handle: InventoryHandle);
    /// Free every native resource held for `handle`. Called exactly once.
    fn release_inventory(&mut self, handle: InventoryHandle);

    // Tag access
    fn tag_access(&mut self, handle: InventoryHandle, ticket: Ticket, request: TagAccessRequest);

    // Battery and SDK
    fn battery_info(&self) -> BatteryInfo;
    fn sdk_info(&self) -> SdkInfo;
    fn set_logging_status(&mut self, mask: u32);

    // Firmware
    fn check_for_firmware_update(&mut self, ticket: Ticket, channel: FirmwareChannel);
    fn load_update(&mut self, ticket: Ticket, name: &str);
    /// Start the loaded update; progress and completion arrive as
    /// [`HardwareCallback::FirmwareProgress`] and
    /// [`HardwareCallback::FirmwareCompleted`].
    fn firmware_update(&mut self);
    fn force_firmware_channel_reload(&mut self, only_if_some_time_has_passed: bool);
    fn force_firmware_check(&mut self);

    // Region
    fn region_names(&mut self, ticket: Ticket);
    fn set_region(&mut self, ticket: Ticket, name: &str);
    fn user_must_set_region(&self) -> bool;
    fn user_can_set_region(&self) -> bool;
}
