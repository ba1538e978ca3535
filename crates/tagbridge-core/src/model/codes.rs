// ── Reader enumerations and result codes ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Addressable tag memory regions, by their protocol code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryBank {
    Reserved,
    #[default]
    Epc,
    Tid,
    User,
}

impl MemoryBank {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Reserved),
            1 => Some(Self::Epc),
            2 => Some(Self::Tid),
            3 => Some(Self::User),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Reserved => 0,
            Self::Epc => 1,
            Self::Tid => 2,
            Self::User => 3,
        }
    }
}

/// Audio feedback played by the reader while an inventory runs.
///
/// The flat configuration schema carries the variant ordinal, not the
/// reader's internal sound code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SoundType {
    #[default]
    None,
    GeigerCounter,
    FirstFind,
    FirstFindAndLast,
}

impl SoundType {
    const ALL: [Self; 4] = [
        Self::None,
        Self::GeigerCounter,
        Self::FirstFind,
        Self::FirstFindAndLast,
    ];

    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn ordinal(self) -> u8 {
        match self {
            Self::None => 0,
            Self::GeigerCounter => 1,
            Self::FirstFind => 2,
            Self::FirstFindAndLast => 3,
        }
    }
}

/// Connection state of the shared reader connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    NotConnected,
    Connecting,
    IncompatibleReader,
    Connected,
}

impl ConnectionState {
    pub fn code(self) -> u8 {
        match self {
            Self::NotConnected => 0,
            Self::Connecting => 1,
            Self::IncompatibleReader => 2,
            Self::Connected => 3,
        }
    }
}

/// Result code reported with an inventory stop event.
///
/// Kept as an open code: drivers may report values this crate does not name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletedResult(pub i32);

impl CompletedResult {
    pub const OK: Self = Self(0);
    pub const SPI_NOT_WORKING: Self = Self(1);
    pub const ENABLE_PIN_NOT_WORKING: Self = Self(2);
    pub const INTERRUPT_PIN_NOT_WORKING: Self = Self(3);
    pub const WRONG_CHIP_VERSION: Self = Self(4);
    pub const CRYSTAL_NOT_STABLE: Self = Self(5);
    pub const PLL_NOT_LOCKED: Self = Self(6);
    pub const BATTERY_TOO_LOW: Self = Self(7);
    pub const TEMPERATURE_TOO_HIGH: Self = Self(8);
    pub const NOT_PROVISIONED: Self = Self(9);
    pub const REGION_NOT_SET: Self = Self(10);
    pub const ERROR_SENDING: Self = Self(98);
    pub const LOST_CONNECTION: Self = Self(99);

    pub fn is_lost_connection(self) -> bool {
        self == Self::LOST_CONNECTION
    }
}

/// Outcome of a tag access (program, write, lock, read, custom command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum TagAccessResult {
    Ok,
    WrongPassword,
    PasswordRequired,
    MemoryOverrun,
    TagNotFound,
    GeneralError,
}

impl From<TagAccessResult> for i32 {
    fn from(value: TagAccessResult) -> Self {
        match value {
            TagAccessResult::Ok => 0,
            TagAccessResult::WrongPassword => 1,
            TagAccessResult::PasswordRequired => 2,
            TagAccessResult::MemoryOverrun => 3,
            TagAccessResult::TagNotFound => 4,
            TagAccessResult::GeneralError => 5,
        }
    }
}

impl From<i32> for TagAccessResult {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::WrongPassword,
            2 => Self::PasswordRequired,
            3 => Self::MemoryOverrun,
            4 => Self::TagNotFound,
            _ => Self::GeneralError,
        }
    }
}

/// Terminal result of a firmware update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirmwareUpdateResult(pub i32);

impl FirmwareUpdateResult {
    pub const SUCCESS: Self = Self(0);
    pub const CRC_MISMATCH: Self = Self(3);
    pub const NO_FILE: Self = Self(100);
    pub const BAD_FILE: Self = Self(101);
    pub const INCOMPATIBLE_HARDWARE: Self = Self(102);
    pub const INCOMPATIBLE_VERSION: Self = Self(103);
    pub const PROTOCOL_FAILURE: Self = Self(104);
    pub const CANT_RECONNECT: Self = Self(105);
    pub const CANCELLED: Self = Self(106);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

/// Firmware distribution channel consulted by update checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FirmwareChannel {
    #[default]
    Release,
    Development,
}
