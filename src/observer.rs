//! Sinks for post-handshake subscription events.

use crate::notification::ObserverEvent;
use crossbeam_channel::{unbounded, Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Receives result and error events once a subscription is streaming.
///
/// Called on whatever thread the notification source delivers on, one event at
/// a time and in arrival order.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: ObserverEvent);
}

/// Observer that queues events on a channel for another thread to drain.
pub struct ChannelObserver {
    sender: Sender<ObserverEvent>,
    receiver: Receiver<ObserverEvent>,
}

impl ChannelObserver {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// A receiver that outlives the observer once it is moved into a bridge.
    pub fn receiver(&self) -> Receiver<ObserverEvent> {
        self.receiver.clone()
    }

    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<ObserverEvent, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<ObserverEvent, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<ObserverEvent, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<ObserverEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Default for ChannelObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for ChannelObserver {
    fn on_event(&self, event: ObserverEvent) {
        // The channel holds its own receiver, so this only fails after drop.
        let _ = self.sender.send(event);
    }
}

/// Observer backed by a closure.
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
    F: Fn(ObserverEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        FnObserver(f)
    }
}

impl<F> Observer for FnObserver<F>
where
    F: Fn(ObserverEvent) + Send + Sync,
{
    fn on_event(&self, event: ObserverEvent) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubscriptionResult;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;

    fn result_event(n: i64) -> ObserverEvent {
        ObserverEvent::Result {
            result: SubscriptionResult::new(json!(n)),
        }
    }

    #[test]
    fn test_channel_observer_preserves_order() {
        let observer = ChannelObserver::new();
        for n in 0..5 {
            observer.on_event(result_event(n));
        }

        let events = observer.drain();
        assert_eq!(events, (0..5).map(result_event).collect::<Vec<_>>());
        assert!(observer.try_recv().is_err());
    }

    #[test]
    fn test_channel_receiver_outlives_observer() {
        let observer = ChannelObserver::new();
        let receiver = observer.receiver();
        observer.on_event(result_event(1));
        drop(observer);

        assert_eq!(receiver.recv_timeout(Duration::from_millis(50)).unwrap(), result_event(1));
    }

    #[test]
    fn test_fn_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let observer = {
            let seen = Arc::clone(&seen);
            FnObserver::new(move |event| seen.lock().push(event))
        };

        observer.on_event(result_event(7));
        assert_eq!(seen.lock().as_slice(), &[result_event(7)]);
    }
}
