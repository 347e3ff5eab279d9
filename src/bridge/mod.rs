//! The indication bridge.
//!
//! Reconciles the two ways a subscription is consumed:
//! - a blocking handshake: `subscribe` waits for exactly one ack or failure
//! - an open-ended stream of results and errors afterwards, delivered to an
//!   [`Observer`](crate::Observer) on the source's threads
//!
//! Notification rules, applied in order:
//! 1. after dispose, everything is discarded
//! 2. an error before the ack fails the handshake and is not forwarded; after
//!    the ack it is forwarded as an event
//! 3. a result is forwarded immediately, ack or not
//! 4. an ack resolves the handshake once; repeats are logged and dropped
//!
//! `subscribe` fails if any error has been captured by the time it wakes,
//! including one that followed the ack.
//!
//! # Example
//!
//! ```ignore
//! let source = Arc::new(MemorySource::new());
//! let observer = Arc::new(ChannelObserver::new());
//! let events = observer.receiver();
//!
//! let bridge = IndicationBridge::new(source.clone(), observer);
//! bridge.subscribe("node-7", SubscriptionRequest::new("SELECT * FROM ProcessStart"))?;
//!
//! loop {
//!     match events.recv() {
//!         Ok(ObserverEvent::Result { result }) => println!("indication: {:?}", result),
//!         Ok(ObserverEvent::Error { error }) => eprintln!("stream error: {}", error),
//!         Err(_) => break,
//!     }
//! }
//! ```

mod handle;
mod indication;
mod sink;

pub use handle::{BridgeStats, SubscriptionHandle, SubscriptionState};
pub use indication::{BridgeConfig, IndicationBridge};
pub use sink::{FailureSink, ReturnFailure, SubscriptionFailure, TerminatingContext};
