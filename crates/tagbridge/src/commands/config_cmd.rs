//! Config subcommand handlers.

use tagbridge_config::{self as config, Config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = global.config.clone().unwrap_or_else(config::config_path);

    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load_config(Some(&path))?;
            output::print_output(config::to_toml(&cfg)?.trim_end());
        }
        ConfigCommand::Path => output::print_output(&path.display().to_string()),
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists { path });
            }
            let written = config::save_config(&Config::default(), Some(&path))?;
            eprintln!("Wrote {}", written.display());
        }
    }
    Ok(())
}
