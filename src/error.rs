//! Error types for hustle
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown id, missing configuration)
//! - 4: Operation failed (remote store, collaborator, I/O)
//!
//! Corrupt or partially malformed local state is not an error: it is
//! recovered during load and reported as a [`crate::store::LoadIssue`].

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the hf CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for hustle operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0} is not configured")]
    ConfigurationMissing(&'static str),

    // Operation failures (exit code 4)
    #[error("Remote {stage} failed: {message}")]
    Remote { stage: String, message: String },

    #[error("Collaborator returned {status}: {message}")]
    Collaborator { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::NotFound { .. }
            | Error::ConfigurationMissing(_) => exit_codes::USER_ERROR,

            Error::Remote { .. }
            | Error::Collaborator { .. }
            | Error::Http(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Short machine-readable kind used in JSON error envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
            Error::NotFound { .. } => "not_found",
            Error::ConfigurationMissing(_) => "configuration_missing",
            Error::Remote { .. } => "remote_failure",
            Error::Collaborator { .. } => "collaborator_failure",
            Error::Http(_) => "http",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::TomlParse(_) | Error::TomlSerialize(_) => "toml",
            Error::LockFailed(_) => "lock_failed",
            Error::OperationFailed(_) => "operation_failed",
        }
    }

    pub(crate) fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub(crate) fn remote(stage: impl Into<String>, message: impl ToString) -> Self {
        Error::Remote {
            stage: stage.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for hustle operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configuration_is_a_user_error() {
        let err = Error::ConfigurationMissing("remote store");
        assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
        assert_eq!(err.to_string(), "remote store is not configured");
    }

    #[test]
    fn remote_failure_carries_underlying_message() {
        let err = Error::remote("insert work_items", "connection reset");
        assert_eq!(err.exit_code(), exit_codes::OPERATION_FAILED);
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(err.kind(), "remote_failure");
    }
}
