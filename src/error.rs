//! Error types for backup operations.

use std::io;
use thiserror::Error;

/// Errors that can occur while reconciling or transferring a backup tree.
#[derive(Error, Debug)]
pub enum BackupError {
    /// I/O error during staging or process management.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// HTTP request error while delivering a notification.
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization error while building a notification.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),

    /// An external command exited unsuccessfully.
    #[error("Command `{command}` failed with exit status {}: {stderr}", status_label(.status))]
    CommandFailed {
        /// The full command line that was run.
        command: String,
        /// Exit code, or `None` when the process was killed by a signal.
        status: Option<i32>,
        /// Trimmed standard error of the process.
        stderr: String,
    },

    /// A listing record could not be parsed.
    #[error("Unparsable output from `{command}`: {reason} (line: {line:?})")]
    Parse {
        command: String,
        line: String,
        reason: String,
    },

    /// An operation kept failing until the retry policy gave up.
    #[error("{context}: giving up after {attempts} attempts")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        #[source]
        source: Box<BackupError>,
    },

    /// Invalid run configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}
