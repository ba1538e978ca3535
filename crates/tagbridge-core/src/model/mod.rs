// ── Domain model ──
//
// Canonical reader-side types shared by the driver seam, the registries
// and the payload encoder.

pub mod codes;
pub mod reader;
pub mod tag;

pub use codes::{
    CompletedResult, ConnectionState, FirmwareChannel, FirmwareUpdateResult, MemoryBank,
    SoundType, TagAccessResult,
};
pub use reader::{BatteryInfo, FirmwareUpdateInfo, ReaderInfo, SdkInfo};
pub use tag::{DetailedPerReadData, Epc, Tag, TagReadState};
