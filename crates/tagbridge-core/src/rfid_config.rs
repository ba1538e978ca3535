//! RFID configuration marshalling.
//!
//! Callers submit a configuration as a flat, positionally ordered array of
//! [`FIELD_COUNT`] scalars. The same ordering is used in the opposite
//! direction to publish the built-in presets, so a caller can introspect a
//! preset with exactly the schema it uses to submit a custom configuration.
//!
//! | index | field                         | index | field                          |
//! |-------|-------------------------------|-------|--------------------------------|
//! | 0     | initial power level (dBm)     | 19    | max reserved bytes             |
//! | 1     | min power level               | 20    | continual                      |
//! | 2     | max power level               | 21    | report RSSI                    |
//! | 3     | initial Q                     | 22    | detailed per-read data         |
//! | 4     | min Q                         | 23    | report subsequent finds        |
//! | 5     | max Q                         | 24    | sound type (ordinal)           |
//! | 6     | session                       | 25    | volume (0..1)                  |
//! | 7     | rounds with no finds → toggle | 26    | history interval (ms)          |
//! | 8     | sensitivity                   | 27    | history depth                  |
//! | 9     | write power level             | 28    | select mask (hex, "" = none)   |
//! | 10    | write sensitivity             | 29    | select mask bit length         |
//! | 11    | set listen-before-talk        | 30    | select bit offset              |
//! | 12    | listen-before-talk            | 31    | select memory bank             |
//! | 13    | max rounds per second         | 32    | detailed per-read read count   |
//! | 14–15 | min/max TID bytes             | 33–34 | per-read bank 1, word offset 1 |
//! | 16–17 | min/max user bytes            | 35–36 | per-read bank 2, word offset 2 |
//! | 18    | min reserved bytes            |       |                                |

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::args::Args;
use crate::codec;
use crate::error::CoreError;
use crate::model::{MemoryBank, SoundType};

/// Number of positional fields in the flat configuration schema.
pub const FIELD_COUNT: usize = 37;

const MASK_INDEX: usize = 28;
const MASK_BIT_LENGTH_INDEX: usize = 29;

// ── Select mask ──────────────────────────────────────────────────

/// Bit-level SELECT filter applied before each inventory round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectMask {
    bytes: Vec<u8>,
    bit_length: u32,
}

impl SelectMask {
    /// Build a mask from its flat representation.
    ///
    /// Empty mask text means "no selection filter", whatever bit length
    /// accompanies it. A bit length of zero means "unspecified" and
    /// expands to the full byte length of the mask.
    pub fn from_parts(mask_hex: &str, bit_length: i64) -> Result<Option<Self>, CoreError> {
        if mask_hex.is_empty() {
            return Ok(None);
        }
        let bytes = codec::decode_hex(mask_hex)?;
        let full = u32::try_from(bytes.len() * 8).unwrap_or(u32::MAX);
        let bit_length = match bit_length {
            0 => full,
            n => u32::try_from(n)
                .ok()
                .filter(|&bits| bits <= full)
                .ok_or_else(|| CoreError::InvalidArgument {
                    command: "selectMask".into(),
                    reason: format!("bit length {n} outside 0..={full}"),
                })?,
        };
        Ok(Some(Self { bytes, bit_length }))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn bit_length(&self) -> u32 {
        self.bit_length
    }
}

// ── Configuration ────────────────────────────────────────────────

/// Full reader configuration for one inventory session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfidConfiguration {
    // Power, in dBm (0 = reader maximum)
    pub initial_power_level: f64,
    pub min_power_level: f64,
    pub max_power_level: f64,
    pub power_level_write: f64,

    // Anti-collision
    pub initial_q_value: i32,
    pub min_q_value: i32,
    pub max_q_value: i32,
    pub session: i32,
    /// 0 = never toggle A/B.
    pub rounds_with_no_finds_to_toggle_ab: i32,

    pub sensitivity: i32,
    pub sensitivity_write: i32,

    pub set_listen_before_talk: bool,
    pub listen_before_talk: bool,

    /// 0 = no limit.
    pub max_rounds_per_second: i32,

    // Memory bank reads (max 0 = don't read the bank)
    pub min_tid_bytes: i32,
    pub max_tid_bytes: i32,
    pub min_user_bytes: i32,
    pub max_user_bytes: i32,
    pub min_reserved_bytes: i32,
    pub max_reserved_bytes: i32,

    pub continual: bool,
    pub report_rssi: bool,
    pub detailed_per_read_data: bool,
    pub report_subsequent_finds: bool,

    pub sound_type: SoundType,
    pub volume: f64,

    pub history_interval_msec: i32,
    pub history_depth: i32,

    pub select_mask: Option<SelectMask>,
    pub select_offset: i32,
    pub select_bank: MemoryBank,

    pub detailed_per_read_num_reads: i32,
    pub detailed_per_read_memory_bank1: MemoryBank,
    pub detailed_per_read_word_offset1: i32,
    pub detailed_per_read_memory_bank2: MemoryBank,
    pub detailed_per_read_word_offset2: i32,
}

impl Default for RfidConfiguration {
    fn default() -> Self {
        Self {
            initial_power_level: 0.0,
            min_power_level: 0.0,
            max_power_level: 0.0,
            power_level_write: 0.0,
            initial_q_value: 4,
            min_q_value: 0,
            max_q_value: 15,
            session: 0,
            rounds_with_no_finds_to_toggle_ab: 0,
            sensitivity: 0,
            sensitivity_write: 0,
            set_listen_before_talk: false,
            listen_before_talk: false,
            max_rounds_per_second: 0,
            min_tid_bytes: 0,
            max_tid_bytes: 0,
            min_user_bytes: 0,
            max_user_bytes: 0,
            min_reserved_bytes: 0,
            max_reserved_bytes: 0,
            continual: true,
            report_rssi: false,
            detailed_per_read_data: false,
            report_subsequent_finds: false,
            sound_type: SoundType::None,
            volume: 1.0,
            history_interval_msec: 500,
            history_depth: 20,
            select_mask: None,
            select_offset: 0,
            select_bank: MemoryBank::Epc,
            detailed_per_read_num_reads: 0,
            detailed_per_read_memory_bank1: MemoryBank::Epc,
            detailed_per_read_word_offset1: 0,
            detailed_per_read_memory_bank2: MemoryBank::Epc,
            detailed_per_read_word_offset2: 0,
        }
    }
}

impl RfidConfiguration {
    /// Decode the flat positional schema.
    pub fn from_values(values: &[Value]) -> Result<Self, CoreError> {
        Self::from_args(&Args::new("rfidConfiguration", values))
    }

    pub(crate) fn from_args(a: &Args<'_>) -> Result<Self, CoreError> {
        if a.len() < FIELD_COUNT {
            return Err(CoreError::marshalling(a.command(), a.len(), "present"));
        }

        let bank = |i: usize| -> Result<MemoryBank, CoreError> {
            MemoryBank::from_code(a.int(i)?)
                .ok_or_else(|| CoreError::marshalling(a.command(), i, "a memory bank code"))
        };
        let sound_type = SoundType::from_ordinal(a.int(24)?)
            .ok_or_else(|| CoreError::marshalling(a.command(), 24, "a sound type ordinal"))?;

        let mask_hex = a.opt_string(MASK_INDEX)?.unwrap_or_default();
        let select_mask = if mask_hex.is_empty() {
            None
        } else {
            SelectMask::from_parts(mask_hex, a.int(MASK_BIT_LENGTH_INDEX)?)?
        };

        Ok(Self {
            initial_power_level: a.f64(0)?,
            min_power_level: a.f64(1)?,
            max_power_level: a.f64(2)?,
            initial_q_value: a.i32(3)?,
            min_q_value: a.i32(4)?,
            max_q_value: a.i32(5)?,
            session: a.i32(6)?,
            rounds_with_no_finds_to_toggle_ab: a.i32(7)?,
            sensitivity: a.i32(8)?,
            power_level_write: a.f64(9)?,
            sensitivity_write: a.i32(10)?,
            set_listen_before_talk: a.bool(11)?,
            listen_before_talk: a.bool(12)?,
            max_rounds_per_second: a.i32(13)?,
            min_tid_bytes: a.i32(14)?,
            max_tid_bytes: a.i32(15)?,
            min_user_bytes: a.i32(16)?,
            max_user_bytes: a.i32(17)?,
            min_reserved_bytes: a.i32(18)?,
            max_reserved_bytes: a.i32(19)?,
            continual: a.bool(20)?,
            report_rssi: a.bool(21)?,
            detailed_per_read_data: a.bool(22)?,
            report_subsequent_finds: a.bool(23)?,
            sound_type,
            volume: a.f64(25)?,
            history_interval_msec: a.i32(26)?,
            history_depth: a.i32(27)?,
            select_mask,
            select_offset: a.i32(30)?,
            select_bank: bank(31)?,
            detailed_per_read_num_reads: a.i32(32)?,
            detailed_per_read_memory_bank1: bank(33)?,
            detailed_per_read_word_offset1: a.i32(34)?,
            detailed_per_read_memory_bank2: bank(35)?,
            detailed_per_read_word_offset2: a.i32(36)?,
        })
    }

    /// Encode into the flat positional schema accepted by
    /// [`from_values`](Self::from_values).
    pub fn to_values(&self) -> Vec<Value> {
        let (mask, mask_bits) = self
            .select_mask
            .as_ref()
            .map_or((String::new(), 0), |m| (codec::to_hex(m.bytes()), m.bit_length()));

        vec![
            json!(self.initial_power_level),
            json!(self.min_power_level),
            json!(self.max_power_level),
            json!(self.initial_q_value),
            json!(self.min_q_value),
            json!(self.max_q_value),
            json!(self.session),
            json!(self.rounds_with_no_finds_to_toggle_ab),
            json!(self.sensitivity),
            json!(self.power_level_write),
            json!(self.sensitivity_write),
            json!(self.set_listen_before_talk),
            json!(self.listen_before_talk),
            json!(self.max_rounds_per_second),
            json!(self.min_tid_bytes),
            json!(self.max_tid_bytes),
            json!(self.min_user_bytes),
            json!(self.max_user_bytes),
            json!(self.min_reserved_bytes),
            json!(self.max_reserved_bytes),
            json!(self.continual),
            json!(self.report_rssi),
            json!(self.detailed_per_read_data),
            json!(self.report_subsequent_finds),
            json!(self.sound_type.ordinal()),
            json!(self.volume),
            json!(self.history_interval_msec),
            json!(self.history_depth),
            json!(mask),
            json!(mask_bits),
            json!(self.select_offset),
            json!(self.select_bank.code()),
            json!(self.detailed_per_read_num_reads),
            json!(self.detailed_per_read_memory_bank1.code()),
            json!(self.detailed_per_read_word_offset1),
            json!(self.detailed_per_read_memory_bank2.code()),
            json!(self.detailed_per_read_word_offset2),
        ]
    }

    /// Effective select-mask bit length; 0 when no mask is set.
    pub fn select_mask_bit_length(&self) -> u32 {
        self.select_mask.as_ref().map_or(0, SelectMask::bit_length)
    }
}

// ── Presets ──────────────────────────────────────────────────────

/// Built-in inventory presets, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InventoryType {
    LocateDistance,
    InventoryShortRange,
    InventoryDistance,
    LocateShortRange,
    LocateVeryShortRange,
}

impl InventoryType {
    /// Catalog order; position `i` has preset index `i + 1`.
    pub const ALL: [Self; 5] = [
        Self::LocateDistance,
        Self::InventoryShortRange,
        Self::InventoryDistance,
        Self::LocateShortRange,
        Self::LocateVeryShortRange,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        index
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn index(self) -> usize {
        match self {
            Self::LocateDistance => 1,
            Self::InventoryShortRange => 2,
            Self::InventoryDistance => 3,
            Self::LocateShortRange => 4,
            Self::LocateVeryShortRange => 5,
        }
    }

    /// Human-readable name for a 1-based preset index.
    pub fn name_for_index(index: usize) -> Option<&'static str> {
        Self::from_index(index).map(Self::name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::LocateDistance => "Locate at a distance",
            Self::InventoryShortRange => "Inventory short range",
            Self::InventoryDistance => "Inventory at a distance",
            Self::LocateShortRange => "Locate at short range",
            Self::LocateVeryShortRange => "Locate at very short range",
        }
    }

    pub fn configuration(self) -> RfidConfiguration {
        let locate = RfidConfiguration {
            initial_q_value: 2,
            session: 0,
            report_rssi: true,
            report_subsequent_finds: true,
            sound_type: SoundType::GeigerCounter,
            history_interval_msec: 250,
            history_depth: 8,
            ..RfidConfiguration::default()
        };
        let inventory = RfidConfiguration {
            initial_q_value: 5,
            session: 2,
            rounds_with_no_finds_to_toggle_ab: 4,
            sound_type: SoundType::FirstFind,
            ..RfidConfiguration::default()
        };

        match self {
            Self::LocateDistance => RfidConfiguration {
                initial_power_level: 30.0,
                min_power_level: 30.0,
                max_power_level: 30.0,
                ..locate
            },
            Self::InventoryShortRange => RfidConfiguration {
                initial_power_level: 20.0,
                min_power_level: 13.0,
                max_power_level: 23.0,
                ..inventory
            },
            Self::InventoryDistance => RfidConfiguration {
                initial_power_level: 30.0,
                min_power_level: 25.0,
                max_power_level: 30.0,
                sensitivity: -70,
                ..inventory
            },
            Self::LocateShortRange => RfidConfiguration {
                initial_power_level: 20.0,
                min_power_level: 20.0,
                max_power_level: 20.0,
                ..locate
            },
            Self::LocateVeryShortRange => RfidConfiguration {
                initial_power_level: 10.0,
                min_power_level: 10.0,
                max_power_level: 10.0,
                sensitivity: -50,
                ..locate
            },
        }
    }
}

/// Encode a set of presets into per-preset flat value lists, paired with
/// the preset names looked up by 1-based catalog position.
pub fn encode_catalog(presets: &[InventoryType]) -> (Vec<Vec<Value>>, Vec<String>) {
    presets
        .iter()
        .enumerate()
        .map(|(i, preset)| {
            let name = InventoryType::name_for_index(i + 1).unwrap_or_else(|| preset.name());
            (preset.configuration().to_values(), name.to_owned())
        })
        .unzip()
}

/// The `[flat values, names]` pair published by `getRfidConfigs`: every
/// preset's values concatenated in catalog order, then the names.
pub fn catalog_payload(presets: &[InventoryType]) -> Value {
    let (values, names) = encode_catalog(presets);
    let flat: Vec<Value> = values.into_iter().flatten().collect();
    json!([flat, names])
}
