//! Notification shapes flowing in from a source and out to an observer.

use crate::types::{RemoteError, SubscriptionResult};
use serde::{Deserialize, Serialize};

/// A raw notification delivered by a [`NotificationSource`](crate::NotificationSource).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The subscription was accepted; carries no data.
    AckMarker,

    /// A delivered indication.
    Result { result: SubscriptionResult },

    /// A delivered failure.
    Error { error: RemoteError },

    /// Informational traffic (progress, verbose output) sharing the channel.
    Diagnostic { message: String },
}

impl Notification {
    pub fn result(result: SubscriptionResult) -> Self {
        Notification::Result { result }
    }

    pub fn error(error: RemoteError) -> Self {
        Notification::Error { error }
    }

    pub fn diagnostic(message: impl Into<String>) -> Self {
        Notification::Diagnostic {
            message: message.into(),
        }
    }

    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::AckMarker => "ack",
            Notification::Result { .. } => "result",
            Notification::Error { .. } => "error",
            Notification::Diagnostic { .. } => "diagnostic",
        }
    }
}

/// Events handed to an [`Observer`](crate::Observer) once a subscription streams.
///
/// Ack markers and diagnostics never appear here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObserverEvent {
    Result { result: SubscriptionResult },
    Error { error: RemoteError },
}

impl ObserverEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, ObserverEvent::Error { .. })
    }
}
