// ── Core error types ──
//
// Caller-facing errors from tagbridge-core. Registry and marshalling
// failures are reported on the reply stream of the command that caused
// them; none of them terminate the executor.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // ── Registry errors ──────────────────────────────────────────────
    #[error("inventory session '{id}' is already active")]
    DuplicateSessionId { id: String },

    #[error("{command} called with no active inventory")]
    NoActiveSession { command: String, id: String },

    // ── Encoding errors ──────────────────────────────────────────────
    #[error("malformed hex encoding: {reason}")]
    MalformedEncoding { reason: String },

    #[error("{command}: argument {index} is missing or not {expected}")]
    Marshalling {
        command: String,
        index: usize,
        expected: &'static str,
    },

    #[error("{command}: {reason}")]
    InvalidArgument { command: String, reason: String },

    // ── Dispatch errors ──────────────────────────────────────────────
    #[error("unknown command: {name}")]
    UnknownCommand { name: String },

    #[error("a firmware update is already in progress")]
    FirmwareUpdateInProgress,

    #[error("bridge executor is not running")]
    BridgeClosed,
}

impl CoreError {
    pub(crate) fn marshalling(command: &str, index: usize, expected: &'static str) -> Self {
        Self::Marshalling {
            command: command.to_owned(),
            index,
            expected,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            reason: reason.into(),
        }
    }
}
