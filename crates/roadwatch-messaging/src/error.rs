//! Error types for the replica convergence protocol.

use roadwatch_core::StoreError;

/// Errors that can occur while exchanging commands and events.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The bus could not deliver a message or no replica answered in time.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload could not be encoded or decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A payload carried a timestamp that is not RFC3339.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The replica handling a command failed to make it durable.
    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// The local store refused the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
}
