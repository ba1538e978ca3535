// ── Command surface ──
//
// Callers address the bridge with a command name plus a positional JSON
// argument array. `Command::decode` turns that pair into a typed command
// before anything touches shared state.

use std::str::FromStr;

use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::args::Args;
use crate::codec;
use crate::driver::TagAccessRequest;
use crate::error::CoreError;
use crate::model::{Epc, MemoryBank};
use crate::rfid_config::RfidConfiguration;
use crate::session::{EventInterest, TargetEpcs};

/// Wire names of every command the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum CommandName {
    // Inventory
    StartInventory,
    StopInventory,
    PauseInventory,
    ResumeInventory,
    // Tag access
    ProgramTag,
    WriteTag,
    LockUnlockTag,
    ReadTag,
    CustomCommandToTag,
    ChangePower,
    // Connection
    AddConnectionStateCallback,
    RemoveConnectionStateCallback,
    OpenConnection,
    CloseConnection,
    // Battery
    GetBatteryInfo,
    // Firmware
    AutomaticCheckForFirmwareUpdate,
    LoadUpdateWithName,
    FirmwareUpdate,
    ForceFirmwareChannelReload,
    ForceFirmwareGrokkerCheck,
    // Region
    GetRegionNames,
    SetRegion,
    UserMustSetRegion,
    UserCanSetRegion,
    // Internal
    GetSdkStaticInfo,
    GetRfidConfigs,
    SetLogging,
    Log,
}

impl CommandName {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// A decoded caller command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // ── Inventory ────────────────────────────────────────────────
    StartInventory {
        id: String,
        config: Box<RfidConfiguration>,
        targets: TargetEpcs,
        interest: EventInterest,
    },
    StopInventory {
        id: String,
    },
    PauseInventory {
        id: String,
    },
    ResumeInventory {
        id: String,
    },

    // ── Tag access (against a running session) ───────────────────
    TagAccess {
        name: CommandName,
        id: String,
        request: TagAccessRequest,
    },

    // ── Connection ───────────────────────────────────────────────
    AddConnectionStateCallback {
        listener: i64,
    },
    RemoveConnectionStateCallback {
        listener: i64,
    },
    OpenConnection,
    CloseConnection,

    GetBatteryInfo,

    // ── Firmware ─────────────────────────────────────────────────
    AutomaticCheckForFirmwareUpdate,
    LoadUpdateWithName {
        name: String,
    },
    FirmwareUpdate,
    ForceFirmwareChannelReload {
        only_if_some_time_has_passed: bool,
    },
    ForceFirmwareGrokkerCheck,

    // ── Region ───────────────────────────────────────────────────
    GetRegionNames,
    SetRegion {
        name: String,
    },
    UserMustSetRegion,
    UserCanSetRegion,

    // ── Internal ─────────────────────────────────────────────────
    GetSdkStaticInfo,
    GetRfidConfigs,
    SetLogging {
        mask: u32,
    },
    Log {
        message: String,
    },
}

impl Command {
    /// Decode a named command and its positional arguments.
    pub fn decode(name: &str, args: &[Value]) -> Result<Self, CoreError> {
        let command = CommandName::from_str(name).map_err(|_| CoreError::UnknownCommand {
            name: name.to_owned(),
        })?;
        let a = Args::new(command.as_str(), args);

        let decoded = match command {
            CommandName::StartInventory => decode_start(&a)?,
            CommandName::StopInventory => Self::StopInventory { id: a.string(0)?.into() },
            CommandName::PauseInventory => Self::PauseInventory { id: a.string(0)?.into() },
            CommandName::ResumeInventory => Self::ResumeInventory { id: a.string(0)?.into() },

            CommandName::ProgramTag
            | CommandName::WriteTag
            | CommandName::LockUnlockTag
            | CommandName::ReadTag
            | CommandName::CustomCommandToTag
            | CommandName::ChangePower => Self::TagAccess {
                name: command,
                id: a.string(0)?.into(),
                request: decode_tag_access(command, &a)?,
            },

            CommandName::AddConnectionStateCallback => Self::AddConnectionStateCallback {
                listener: a.int(0)?,
            },
            CommandName::RemoveConnectionStateCallback => Self::RemoveConnectionStateCallback {
                listener: a.int(0)?,
            },
            CommandName::OpenConnection => Self::OpenConnection,
            CommandName::CloseConnection => Self::CloseConnection,
            CommandName::GetBatteryInfo => Self::GetBatteryInfo,

            CommandName::AutomaticCheckForFirmwareUpdate => Self::AutomaticCheckForFirmwareUpdate,
            CommandName::LoadUpdateWithName => Self::LoadUpdateWithName {
                name: a.string(0)?.into(),
            },
            CommandName::FirmwareUpdate => Self::FirmwareUpdate,
            CommandName::ForceFirmwareChannelReload => Self::ForceFirmwareChannelReload {
                only_if_some_time_has_passed: a.bool(0)?,
            },
            CommandName::ForceFirmwareGrokkerCheck => Self::ForceFirmwareGrokkerCheck,

            CommandName::GetRegionNames => Self::GetRegionNames,
            CommandName::SetRegion => Self::SetRegion {
                name: a.string(0)?.into(),
            },
            CommandName::UserMustSetRegion => Self::UserMustSetRegion,
            CommandName::UserCanSetRegion => Self::UserCanSetRegion,

            CommandName::GetSdkStaticInfo => Self::GetSdkStaticInfo,
            CommandName::GetRfidConfigs => Self::GetRfidConfigs,
            CommandName::SetLogging => Self::SetLogging { mask: a.u32(0)? },
            CommandName::Log => Self::Log {
                message: a.string(0)?.into(),
            },
        };
        Ok(decoded)
    }

    pub fn name(&self) -> CommandName {
        match self {
            Self::StartInventory { .. } => CommandName::StartInventory,
            Self::StopInventory { .. } => CommandName::StopInventory,
            Self::PauseInventory { .. } => CommandName::PauseInventory,
            Self::ResumeInventory { .. } => CommandName::ResumeInventory,
            Self::TagAccess { name, .. } => *name,
            Self::AddConnectionStateCallback { .. } => CommandName::AddConnectionStateCallback,
            Self::RemoveConnectionStateCallback { .. } => {
                CommandName::RemoveConnectionStateCallback
            }
            Self::OpenConnection => CommandName::OpenConnection,
            Self::CloseConnection => CommandName::CloseConnection,
            Self::GetBatteryInfo => CommandName::GetBatteryInfo,
            Self::AutomaticCheckForFirmwareUpdate => CommandName::AutomaticCheckForFirmwareUpdate,
            Self::LoadUpdateWithName { .. } => CommandName::LoadUpdateWithName,
            Self::FirmwareUpdate => CommandName::FirmwareUpdate,
            Self::ForceFirmwareChannelReload { .. } => CommandName::ForceFirmwareChannelReload,
            Self::ForceFirmwareGrokkerCheck => CommandName::ForceFirmwareGrokkerCheck,
            Self::GetRegionNames => CommandName::GetRegionNames,
            Self::SetRegion { .. } => CommandName::SetRegion,
            Self::UserMustSetRegion => CommandName::UserMustSetRegion,
            Self::UserCanSetRegion => CommandName::UserCanSetRegion,
            Self::GetSdkStaticInfo => CommandName::GetSdkStaticInfo,
            Self::GetRfidConfigs => CommandName::GetRfidConfigs,
            Self::SetLogging { .. } => CommandName::SetLogging,
            Self::Log { .. } => CommandName::Log,
        }
    }
}

// ── Argument layouts ─────────────────────────────────────────────

/// `[id, values[37], epcs|null, epcsAreIgnoreList, tagChanged, tagFound,
/// tagSubsequentFinds, historyInterval]`
fn decode_start(a: &Args<'_>) -> Result<Command, CoreError> {
    let id = a.string(0)?.to_owned();
    let config = RfidConfiguration::from_args(&a.array(1)?)?;

    let epcs = a
        .opt_array(2)?
        .map(|list| list.strings())
        .transpose()?
        .map(|list| list.into_iter().map(Epc::from).collect());
    let targets = TargetEpcs::from_list(epcs, a.opt_bool(3)?);

    let interest = EventInterest {
        tag_changed: a.opt_bool(4)?,
        tag_found: a.opt_bool(5)?,
        tag_subsequent_finds: a.opt_bool(6)?,
        history_interval: a.opt_bool(7)?,
    };

    Ok(Command::StartInventory {
        id,
        config: Box::new(config),
        targets,
        interest,
    })
}

fn bank(a: &Args<'_>, index: usize) -> Result<MemoryBank, CoreError> {
    MemoryBank::from_code(a.int(index)?)
        .ok_or_else(|| CoreError::marshalling(a.command(), index, "a memory bank code"))
}

fn epc(a: &Args<'_>, index: usize) -> Result<Epc, CoreError> {
    a.string(index).map(Epc::from)
}

fn decode_tag_access(name: CommandName, a: &Args<'_>) -> Result<TagAccessRequest, CoreError> {
    let request = match name {
        // [id, oldEpc, newEpc, password]
        CommandName::ProgramTag => TagAccessRequest::Program {
            old_epc: epc(a, 1)?,
            new_epc: epc(a, 2)?,
            password: a.u32(3)?,
        },
        // [id, epc, bank, offset, dataHex, previousHex|null, password]
        CommandName::WriteTag => {
            let data = codec::decode_hex(a.string(4)?)?;
            if data.is_empty() {
                return Err(CoreError::InvalidArgument {
                    command: a.command().to_owned(),
                    reason: "no data to write".into(),
                });
            }
            TagAccessRequest::Write {
                epc: epc(a, 1)?,
                bank: bank(a, 2)?,
                offset: a.u32(3)?,
                data,
                previous: codec::decode_optional_hex(a.opt_string(5)?)?,
                password: a.u32(6)?,
            }
        }
        // [id, epc, maskAndAction, password]
        CommandName::LockUnlockTag => TagAccessRequest::LockUnlock {
            epc: epc(a, 1)?,
            mask_and_action: a.u32(2)?,
            password: a.u32(3)?,
        },
        // [id, epc, bank, offset, minBytes, maxBytes]
        CommandName::ReadTag => TagAccessRequest::Read {
            epc: epc(a, 1)?,
            bank: bank(a, 2)?,
            offset: a.u32(3)?,
            min_bytes: a.u32(4)?,
            max_bytes: a.u32(5)?,
        },
        // [id, epc, commandHex, commandBits, responseBitsNoHeader,
        //  responseBitsWithHeader, receiveTimeoutUsec]
        CommandName::CustomCommandToTag => TagAccessRequest::CustomCommand {
            epc: epc(a, 1)?,
            command: codec::decode_hex(a.string(2)?)?,
            command_bits: a.u32(3)?,
            response_bits_no_header: a.u32(4)?,
            response_bits_with_header: a.u32(5)?,
            receive_timeout_usec: a.u32(6)?,
        },
        // [id, initial, min, max]
        CommandName::ChangePower => TagAccessRequest::ChangePower {
            initial: a.f64(1)?,
            min: a.f64(2)?,
            max: a.f64(3)?,
        },
        other => {
            return Err(CoreError::InvalidArgument {
                command: other.to_string(),
                reason: "not a tag access command".into(),
            });
        }
    };
    Ok(request)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    fn start_args(extra: &[Value]) -> Vec<Value> {
        let mut args = vec![json!("s1"), Value::Array(RfidConfiguration::default().to_values())];
        args.extend_from_slice(extra);
        args
    }

    #[test]
    fn wire_names_are_camel_case() {
        assert_eq!(CommandName::StartInventory.as_str(), "startInventory");
        assert_eq!(CommandName::GetSdkStaticInfo.to_string(), "getSdkStaticInfo");
        assert_eq!(CommandName::Log.as_str(), "log");
        for name in CommandName::iter() {
            assert_eq!(CommandName::from_str(name.as_str()).unwrap(), name);
        }
    }

    #[test]
    fn unknown_name_is_reported() {
        assert_eq!(
            Command::decode("setHandleScreenRotation", &[]),
            Err(CoreError::UnknownCommand {
                name: "setHandleScreenRotation".into()
            })
        );
    }

    #[test]
    fn start_without_trailing_flags_tracks_all_with_no_interest() {
        let cmd = Command::decode("startInventory", &start_args(&[])).unwrap();
        let Command::StartInventory {
            id,
            targets,
            interest,
            ..
        } = cmd
        else {
            panic!("expected start");
        };
        assert_eq!(id, "s1");
        assert_eq!(targets, TargetEpcs::All);
        assert_eq!(interest, EventInterest::default());
    }

    #[test]
    fn start_with_ignore_list_and_flags() {
        let args = start_args(&[
            json!(["e2001", "e2002"]),
            json!(true),
            json!(true),
            json!(false),
            json!(true),
            json!(null),
        ]);
        let Command::StartInventory {
            targets, interest, ..
        } = Command::decode("startInventory", &args).unwrap()
        else {
            panic!("expected start");
        };
        assert_eq!(
            targets,
            TargetEpcs::Except(vec![Epc::from("e2001"), Epc::from("e2002")])
        );
        assert!(interest.tag_changed);
        assert!(!interest.tag_found);
        assert!(interest.tag_subsequent_finds);
        assert!(!interest.history_interval);
    }

    #[test]
    fn start_with_short_config_is_a_marshalling_error() {
        let args = vec![json!("s1"), json!([1, 2, 3])];
        assert!(matches!(
            Command::decode("startInventory", &args),
            Err(CoreError::Marshalling { index: 3, .. })
        ));
    }

    #[test]
    fn write_tag_decodes_hex_and_optional_previous() {
        let args = vec![
            json!("s1"),
            json!("e2001"),
            json!(3),
            json!(0),
            json!("DEADbeef"),
            json!(null),
            json!(0),
        ];
        let Command::TagAccess { name, request, .. } = Command::decode("writeTag", &args).unwrap()
        else {
            panic!("expected tag access");
        };
        assert_eq!(name, CommandName::WriteTag);
        assert_eq!(
            request,
            TagAccessRequest::Write {
                epc: Epc::from("e2001"),
                bank: MemoryBank::User,
                offset: 0,
                data: vec![0xde, 0xad, 0xbe, 0xef],
                previous: None,
                password: 0,
            }
        );
    }

    #[test]
    fn write_tag_with_empty_data_is_rejected() {
        let args = vec![
            json!("s1"),
            json!("e2001"),
            json!(1),
            json!(2),
            json!(""),
            json!(""),
            json!(0),
        ];
        assert!(matches!(
            Command::decode("writeTag", &args),
            Err(CoreError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn custom_command_with_bad_hex_is_an_encoding_error() {
        let args = vec![
            json!("s1"),
            json!("e2001"),
            json!("zz"),
            json!(8),
            json!(16),
            json!(17),
            json!(20_000),
        ];
        assert!(matches!(
            Command::decode("customCommandToTag", &args),
            Err(CoreError::MalformedEncoding { .. })
        ));
    }

    #[test]
    fn invalid_bank_names_command_and_index() {
        let args = vec![json!("s1"), json!("e2001"), json!(9), json!(0), json!(4), json!(8)];
        assert_eq!(
            Command::decode("readTag", &args),
            Err(CoreError::Marshalling {
                command: "readTag".into(),
                index: 2,
                expected: "a memory bank code",
            })
        );
    }

    #[test]
    fn change_power_takes_three_levels() {
        let args = vec![json!("s1"), json!(20.5), json!(10), json!(30)];
        let cmd = Command::decode("changePower", &args).unwrap();
        assert_eq!(cmd.name(), CommandName::ChangePower);
    }
}
