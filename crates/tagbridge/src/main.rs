mod cli;
mod commands;
mod error;
mod output;
mod sim;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tagbridge_config::{LogConfig, LogFormat};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Install the subscriber on stderr; stdout carries command output.
///
/// `RUST_LOG` wins, then `-v`, then the configured filter.
fn init_tracing(verbosity: u8, log: &LogConfig) {
    let filter = match verbosity {
        0 => log.filter.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Pretty => builder.with_target(false).init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        Command::Run(args) => {
            let config = tagbridge_config::load_config(global.config.as_deref())?;
            init_tracing(global.verbose, &config.log);
            tracing::debug!(?args, "running script");
            commands::run::handle(args, config.bridge_config()?).await
        }

        // Config commands report their own load errors
        Command::Config(args) => {
            init_tracing(global.verbose, &LogConfig::default());
            commands::config_cmd::handle(&args, &global)
        }

        Command::Presets(args) => {
            init_tracing(global.verbose, &LogConfig::default());
            commands::presets::handle(&args)
        }

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "tagbridge", &mut std::io::stdout());
            Ok(())
        }
    }
}
