//! Clap derive structures for the `tagbridge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tagbridge -- drive an RFID reader bridge from JSON-lines scripts
#[derive(Debug, Parser)]
#[command(
    name = "tagbridge",
    version,
    about = "Session-multiplexed RFID reader command bridge",
    long_about = "Runs the tagbridge command/event bridge against a built-in simulated\n\
        reader. Commands are read as JSON lines; every reply is written to stdout\n\
        as one JSON line tagged with the index of the request that produced it.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file to use instead of the platform default
    #[arg(long, env = "TAGBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a JSON-lines command script against the simulated reader
    Run(RunArgs),

    /// List the built-in inventory presets
    Presets(PresetsArgs),

    /// Inspect or create the config file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Script file; reads stdin when omitted
    #[arg(long, short = 's')]
    pub script: Option<PathBuf>,

    /// EPC visible to the simulated reader (repeatable)
    #[arg(long = "tag", value_name = "EPC")]
    pub tags: Vec<String>,

    /// Open the reader connection before running the script
    #[arg(long)]
    pub open: bool,

    /// How long to wait for open streams after the script ends, in milliseconds
    #[arg(long, default_value = "500")]
    pub linger_ms: u64,
}

// ── Presets ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PresetsArgs {
    /// Print the flat catalog exactly as `getRfidConfigs` replies
    #[arg(long)]
    pub json: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
