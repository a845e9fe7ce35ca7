use std::{io::Error as IoError, result::Result as StdResult};

use thiserror::Error;

/// The main error type for sendkey-server operations (crate-internal)
#[derive(Error, Debug)]
pub enum Error {
    /// Error running or managing the coordinator process
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    /// Error in IPC communication
    #[error("IPC error: {0}")]
    Ipc(String),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Stable RPC error codes surfaced via MRPC `ServiceError.name`.
///
/// Use `to_string()` (Display) to produce the canonical code string.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    /// The coordinator is draining and refuses new work
    #[error("ShuttingDown")]
    ShuttingDown,
    /// A request arrived without its required parameters
    #[error("MissingParams")]
    MissingParams,
    /// A parameter had the wrong MessagePack type
    #[error("InvalidType")]
    InvalidType,
    /// A settings payload failed validation
    #[error("InvalidSettings")]
    InvalidSettings,
    /// The request named an unknown RPC method
    #[error("MethodNotFound")]
    MethodNotFound,
}
