//! CLI error types with miette diagnostics.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use tagbridge_config::ConfigError;
use tagbridge_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const BRIDGE: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration could not be loaded")]
    #[diagnostic(
        code(tagbridge::config),
        help(
            "Check the file shown by: tagbridge config path\n\
             Environment overrides use the TAGBRIDGE_ prefix with `__` between keys."
        )
    )]
    Config(#[source] ConfigError),

    #[error("Config file already exists at {}", path.display())]
    #[diagnostic(
        code(tagbridge::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: PathBuf },

    // ── Script ───────────────────────────────────────────────────────

    #[error("Could not read script {}", path.display())]
    #[diagnostic(code(tagbridge::script))]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Bridge ───────────────────────────────────────────────────────

    #[error("Bridge failure: {0}")]
    #[diagnostic(code(tagbridge::bridge))]
    Bridge(#[from] CoreError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(tagbridge::json))]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(ConfigError::Validation { .. }) | Self::ConfigExists { .. } => {
                exit_code::USAGE
            }
            Self::Config(_) => exit_code::CONFIG,
            Self::Bridge(_) => exit_code::BRIDGE,
            Self::Script { .. } | Self::Io(_) | Self::Json(_) => exit_code::GENERAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let invalid = CliError::Config(ConfigError::Validation {
            field: "log.filter".into(),
            reason: "must not be empty".into(),
        });
        assert_eq!(invalid.exit_code(), exit_code::USAGE);
        assert_eq!(CliError::Bridge(CoreError::BridgeClosed).exit_code(), exit_code::BRIDGE);
    }
}
