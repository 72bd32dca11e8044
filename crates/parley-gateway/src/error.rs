use thiserror::Error;

use parley_types::events::ServerEvent;

/// Failure classes for socket event handlers. Everything is handled
/// locally in the handler that produced it; nothing here crosses
/// connection boundaries.
#[derive(Debug, Error)]
pub enum EventError {
    /// Rejected before any state change
    #[error("{0}")]
    Validation(&'static str),

    /// Referenced aggregate does not exist; partial writes already
    /// committed stay in place
    #[error("{0}")]
    NotFound(&'static str),

    /// Storage layer failure
    #[error(transparent)]
    Storage(#[from] anyhow::Error),

    /// A blocking storage task was cancelled or panicked
    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EventError {
    /// The `messageError` payload reported to the originating channel.
    /// Validation and not-found carry their own client-facing text;
    /// internal failures show `generic` with the cause in `details`.
    pub fn to_client_event(&self, generic: &str) -> ServerEvent {
        match self {
            Self::Validation(msg) | Self::NotFound(msg) => ServerEvent::MessageError {
                message: (*msg).to_string(),
                details: None,
            },
            Self::Storage(err) => ServerEvent::MessageError {
                message: generic.to_string(),
                details: Some(err.to_string()),
            },
            Self::Join(err) => ServerEvent::MessageError {
                message: generic.to_string(),
                details: Some(err.to_string()),
            },
        }
    }
}
