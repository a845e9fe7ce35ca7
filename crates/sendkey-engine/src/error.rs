use thiserror::Error;

use crate::surface::EditorId;

/// Errors a host surface can report back to the engine.
///
/// None of these are fatal to the remapper: a missing editor makes a
/// scheduled dispatch a no-op, and a failed control click falls back to a
/// synthetic send.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The addressed editor no longer exists in the document.
    #[error("editor {0:?} is no longer present")]
    EditorGone(EditorId),
    /// A located control could not be activated.
    #[error("send control not clickable: {0}")]
    ControlUnavailable(String),
    /// Synthetic event delivery failed inside the host.
    #[error("synthetic dispatch failed: {0}")]
    Dispatch(String),
}

/// Convenience alias for engine results.
pub type Result<T> = std::result::Result<T, Error>;
