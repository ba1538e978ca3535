//! Subcommand handlers.

pub mod config_cmd;
pub mod presets;
pub mod run;
