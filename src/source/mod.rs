//! The push-style notification source a bridge subscribes through.
//!
//! A source owns the transport, the session and the operation timeout. The
//! bridge only registers a handler and later unregisters it.
//!
//! # Delivery contract
//!
//! Notifications for one registration are expected to arrive one at a time,
//! possibly on a different thread for each call. A source that cannot promise
//! this should be paired with a bridge that keeps
//! [`BridgeConfig::serialize_delivery`](crate::BridgeConfig) enabled.

mod memory;

pub use memory::{MemorySource, MemorySourceConfig, SubscribeReply};

use crate::error::Result;
use crate::notification::Notification;
use crate::types::{RegistrationId, SubscriptionRequest, TargetId};
use std::sync::Arc;

/// Receives raw notifications from a source.
pub trait NotificationHandler: Send + Sync {
    fn on_notification(&self, notification: Notification);
}

/// A remote notification channel that can be subscribed to.
pub trait NotificationSource: Send + Sync {
    /// Start a subscription, delivering its notifications to `handler`.
    ///
    /// Notifications may reach `handler` before this returns.
    fn register(
        &self,
        target: &TargetId,
        request: &SubscriptionRequest,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<RegistrationId>;

    /// Stop delivering to a registration. Unknown ids are ignored.
    ///
    /// Deliveries already in flight may still complete.
    fn unregister(&self, id: RegistrationId);
}
