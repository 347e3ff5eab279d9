//! Error types for the indication bridge.

use crate::types::{RemoteError, TargetId};
use thiserror::Error;

/// Main error type for bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Subscription on {target} failed: {source}")]
    SubscriptionFailed {
        target: TargetId,
        #[source]
        source: RemoteError,
    },

    #[error("Subscription on {target} failed; failure routed to strict failure target")]
    Terminated { target: TargetId },

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Bridge already has a subscription")]
    AlreadySubscribed,

    #[error("Bridge is disposed")]
    Disposed,

    #[error("Notification source is closed")]
    SourceClosed,

    #[error("Notification queue is full")]
    QueueFull,
}

impl BridgeError {
    /// The remote error behind a failed handshake, if this is one.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            BridgeError::SubscriptionFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
