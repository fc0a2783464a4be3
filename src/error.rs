//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by the document orchestration subsystem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BureauError {
    /// A document name has no entry in the configuration.
    #[error("unknown document: {0}")]
    UnknownDocument(String),

    /// An office name has no entry in the configuration.
    #[error("unknown office: {0}")]
    UnknownOffice(String),

    /// `submit` was called on (or a queued entry belonged to) an office that
    /// is shutting down or has shut down.
    #[error("office '{0}' is shutting down")]
    ShuttingDown(String),

    /// The execution substrate cancelled an agent waiting on this task.
    #[error("request cancelled")]
    Cancelled,

    /// Configuration construction rejected the input (duplicate names,
    /// dangling references, or a dependency cycle).
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Any other unexpected failure from a user-supplied callable, the
    /// event sink, or the async runtime.
    #[error("underlying failure: {0}")]
    Underlying(String),
}

impl From<tokio::sync::oneshot::error::RecvError> for BureauError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        BureauError::Cancelled
    }
}

impl From<tokio::task::JoinError> for BureauError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            BureauError::Cancelled
        } else {
            BureauError::Underlying(err.to_string())
        }
    }
}
