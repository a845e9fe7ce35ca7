//! Error handling for the sendkey binary.

use std::{io, result};

use thiserror::Error;

/// Convenient result type for sendkey CLI operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors that can occur while running a CLI command.
#[derive(Debug, Error)]
pub enum Error {
    /// Wrapper for standard I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Errors surfaced by the coordinator client.
    #[error("Coordinator error: {0}")]
    Coordinator(#[from] sendkey_server::Error),
    /// JSON serialization failures for `get --json`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
