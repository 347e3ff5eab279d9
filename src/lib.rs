//! # Indication Bridge
//!
//! Subscribes to a push-style notification source and turns its handshake
//! into a blocking call, then streams the notifications that follow to an
//! observer.
//!
//! ## Core Concepts
//!
//! - **Notification source**: remote channel delivering notifications on its own threads
//! - **Ack gate**: one-shot latch the subscribing thread blocks on
//! - **Bridge**: classifies notifications, resolves the gate once, forwards the rest
//! - **Observer**: caller-supplied sink for result and error events
//! - **Failure sink**: optional strict target that takes handshake failures
//!
//! ## Example
//!
//! ```ignore
//! use indication_bridge::{ChannelObserver, IndicationBridge, MemorySource, SubscriptionRequest};
//!
//! let source = Arc::new(MemorySource::new());
//! let observer = Arc::new(ChannelObserver::new());
//! let events = observer.receiver();
//!
//! let bridge = IndicationBridge::new(source, observer);
//! bridge.subscribe("node-7", SubscriptionRequest::new("SELECT * FROM ProcessStart").with_timeout_ms(5000))?;
//!
//! let first = events.recv()?;
//! bridge.dispose();
//! ```

pub mod bridge;
pub mod error;
pub mod gate;
pub mod notification;
pub mod observer;
pub mod source;
pub mod types;

// Re-exports
pub use bridge::{
    BridgeConfig, BridgeStats, FailureSink, IndicationBridge, ReturnFailure, SubscriptionFailure,
    SubscriptionHandle, SubscriptionState, TerminatingContext,
};
pub use error::{BridgeError, Result};
pub use gate::AckGate;
pub use notification::{Notification, ObserverEvent};
pub use observer::{ChannelObserver, FnObserver, Observer};
pub use source::{
    MemorySource, MemorySourceConfig, NotificationHandler, NotificationSource, SubscribeReply,
};
pub use types::*;
