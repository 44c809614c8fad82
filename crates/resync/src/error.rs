use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResyncError>;

/// Errors that can occur during a full resync.
#[derive(Error, Debug)]
pub enum ResyncError {
    /// A pipeline process could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A pipeline process exited unsuccessfully.
    #[error("Database sync failed: {program} exited with {status}{}", stderr_suffix(.stderr))]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse local database config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid database URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid schedule {expression:?}: {reason}")]
    Schedule { expression: String, reason: String },

    /// The blocking sync task panicked or was cancelled.
    #[error("Sync task failed: {0}")]
    Task(String),
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}
