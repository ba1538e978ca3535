//! `tagbridge presets`: the built-in inventory configurations.

use tabled::Tabled;

use tagbridge_core::InventoryType;
use tagbridge_core::rfid_config::catalog_payload;

use crate::cli::PresetsArgs;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Session")]
    session: i32,
    #[tabled(rename = "Sound")]
    sound: String,
    #[tabled(rename = "Continual")]
    continual: bool,
    #[tabled(rename = "Subsequent finds")]
    subsequent_finds: bool,
    #[tabled(rename = "History (ms)")]
    history_interval_msec: i32,
}

impl From<InventoryType> for PresetRow {
    fn from(preset: InventoryType) -> Self {
        let config = preset.configuration();
        Self {
            index: preset.index(),
            name: preset.name(),
            session: config.session,
            sound: format!("{:?}", config.sound_type),
            continual: config.continual,
            subsequent_finds: config.report_subsequent_finds,
            history_interval_msec: config.history_interval_msec,
        }
    }
}

pub fn handle(args: &PresetsArgs) -> Result<(), CliError> {
    let rendered = if args.json {
        output::render_json_pretty(&catalog_payload(&InventoryType::ALL))?
    } else {
        let rows: Vec<PresetRow> = InventoryType::ALL.into_iter().map(PresetRow::from).collect();
        output::render_table(&rows)
    };
    output::print_output(&rendered);
    Ok(())
}
