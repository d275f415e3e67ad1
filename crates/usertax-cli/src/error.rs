//! CLI error types.

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Store or synchronization error.
    #[error("{0}")]
    Sync(#[from] usertax_sync::Error),

    /// Reading the taxonomy file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering JSON output failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<usertax_core::Error> for CliError {
    fn from(e: usertax_core::Error) -> Self {
        CliError::Sync(e.into())
    }
}
