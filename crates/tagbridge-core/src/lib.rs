// tagbridge-core: Session-multiplexed command/event bridge between callers
// and an RFID reader driver.

mod args;

pub mod bridge;
pub mod codec;
pub mod command;
pub mod completion;
pub mod config;
pub mod driver;
pub mod encode;
pub mod error;
pub mod listener;
pub mod model;
pub mod reply;
pub mod rfid_config;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use command::{Command, CommandName};
pub use config::BridgeConfig;
pub use driver::{
    CallbackHandle, Completion, HardwareCallback, InventoryEvent, InventoryHandle, ReaderDriver,
    TagAccessRequest, Ticket,
};
pub use error::CoreError;
pub use reply::{Reply, ReplySink, ReplyStatus, ReplyStream};
pub use rfid_config::{InventoryType, RfidConfiguration, SelectMask};
pub use session::{EventInterest, SessionState, TargetEpcs};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BatteryInfo, CompletedResult, ConnectionState, DetailedPerReadData, Epc, FirmwareChannel,
    FirmwareUpdateInfo, FirmwareUpdateResult, MemoryBank, ReaderInfo, SdkInfo, SoundType, Tag,
    TagAccessResult, TagReadState,
};
