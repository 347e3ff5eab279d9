//! The bridge between a blocking subscriber and push-style delivery.

use crate::error::{BridgeError, Result};
use crate::gate::AckGate;
use crate::notification::{Notification, ObserverEvent};
use crate::observer::Observer;
use crate::source::{NotificationHandler, NotificationSource};
use crate::types::{
    RegistrationId, RemoteError, SubscriptionRequest, TargetId, DEFAULT_DIALECT,
    DEFAULT_NAMESPACE,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::handle::{BridgeStats, SubscriptionHandle, SubscriptionState};
use super::sink::{FailureSink, ReturnFailure, SubscriptionFailure};

/// Bridge configuration.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Run notification handling under a per-subscription lock.
    /// Turn off only for sources that never deliver concurrently.
    /// Default: true
    pub serialize_delivery: bool,

    /// Namespace for [`IndicationBridge::subscribe_query`].
    pub default_namespace: String,

    /// Dialect for [`IndicationBridge::subscribe_query`].
    pub default_dialect: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serialize_delivery: true,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            default_dialect: DEFAULT_DIALECT.to_string(),
        }
    }
}

/// Classifies notifications for one subscription.
struct Dispatcher {
    handle: SubscriptionHandle,
    gate: AckGate,
    observer: Arc<dyn Observer>,
    delivery: Option<Mutex<()>>,
}

impl Dispatcher {
    fn new(handle: SubscriptionHandle, observer: Arc<dyn Observer>, serialize: bool) -> Self {
        Self {
            handle,
            gate: AckGate::new(),
            observer,
            delivery: serialize.then(|| Mutex::new(())),
        }
    }

    fn on_error(&self, error: RemoteError) {
        self.handle.capture_error(&error);

        if self
            .handle
            .transition(SubscriptionState::Pending, SubscriptionState::Failed)
        {
            debug!(remote = %self.handle.target(), %error, "subscription failed before acknowledgement");
            self.gate.resolve();
            return;
        }

        debug!(remote = %self.handle.target(), %error, "forwarding error event");
        self.handle.count_error();
        self.observer.on_event(ObserverEvent::Error { error });
    }

    fn on_ack(&self) {
        if self
            .handle
            .transition(SubscriptionState::Pending, SubscriptionState::Acknowledged)
        {
            debug!(remote = %self.handle.target(), "subscription acknowledged");
            self.gate.resolve();
            return;
        }

        warn!(
            remote = %self.handle.target(),
            state = ?self.handle.state(),
            "ack marker after subscription already resolved; ignoring"
        );
        self.handle.count_discarded();
    }
}

impl NotificationHandler for Dispatcher {
    fn on_notification(&self, notification: Notification) {
        let _serial = self.delivery.as_ref().map(|lock| lock.lock());

        if self.handle.is_disposed() {
            trace!(remote = %self.handle.target(), kind = notification.kind(), "discarding notification after dispose");
            self.handle.count_discarded();
            return;
        }

        match notification {
            Notification::Error { error } => self.on_error(error),
            Notification::Result { result } => {
                trace!(remote = %self.handle.target(), "forwarding result event");
                self.handle.count_result();
                self.observer.on_event(ObserverEvent::Result { result });
            }
            Notification::AckMarker => self.on_ack(),
            Notification::Diagnostic { message } => {
                debug!(remote = %self.handle.target(), detail = %message, "diagnostic notification");
                self.handle.count_discarded();
            }
        }
    }
}

#[derive(Default)]
struct Slot {
    dispatcher: Option<Arc<Dispatcher>>,
    registration: Option<RegistrationId>,
    disposed: bool,
}

/// Starts one indication subscription and streams what follows to an observer.
///
/// [`subscribe`](Self::subscribe) blocks until the source acknowledges or
/// rejects the subscription. Results and errors arriving afterwards go to the
/// observer on the source's delivery threads until [`dispose`](Self::dispose).
///
/// A bridge carries a single subscription; create another bridge to subscribe
/// again.
pub struct IndicationBridge {
    config: BridgeConfig,
    source: Arc<dyn NotificationSource>,
    observer: Arc<dyn Observer>,
    strict_failure: RwLock<Option<Arc<dyn FailureSink>>>,
    slot: Mutex<Slot>,
}

impl IndicationBridge {
    pub fn new(source: Arc<dyn NotificationSource>, observer: Arc<dyn Observer>) -> Self {
        Self::with_config(source, observer, BridgeConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn NotificationSource>,
        observer: Arc<dyn Observer>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            config,
            source,
            observer,
            strict_failure: RwLock::new(None),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Route handshake failures to `sink` instead of returning them.
    ///
    /// `None` restores the default of returning
    /// [`BridgeError::SubscriptionFailed`].
    pub fn set_strict_failure_target(&self, sink: Option<Arc<dyn FailureSink>>) {
        *self.strict_failure.write() = sink;
    }

    /// Subscribe and block until the subscription is acknowledged or fails.
    ///
    /// A blank `target` fails with [`BridgeError::InvalidArgument`] before the
    /// source is contacted. The wait has no deadline of its own; the source is
    /// expected to answer, or to time the operation out with an error.
    pub fn subscribe(&self, target: &str, request: SubscriptionRequest) -> Result<()> {
        let target = TargetId::new(target)?;

        let dispatcher = {
            let mut slot = self.slot.lock();
            if slot.disposed {
                return Err(BridgeError::Disposed);
            }
            if slot.dispatcher.is_some() {
                return Err(BridgeError::AlreadySubscribed);
            }
            let dispatcher = Arc::new(Dispatcher::new(
                SubscriptionHandle::new(target.clone(), request.clone()),
                Arc::clone(&self.observer),
                self.config.serialize_delivery,
            ));
            slot.dispatcher = Some(Arc::clone(&dispatcher));
            dispatcher
        };

        debug!(
            remote = %target,
            namespace = %request.namespace,
            dialect = %request.dialect,
            query = %request.query,
            timeout_ms = request.timeout_ms,
            "subscribing"
        );

        let handler: Arc<dyn NotificationHandler> = dispatcher.clone();
        let registration = match self.source.register(&target, &request, handler) {
            Ok(id) => id,
            Err(err) => {
                dispatcher
                    .handle
                    .transition(SubscriptionState::Pending, SubscriptionState::Failed);
                warn!(remote = %target, error = %err, "source refused registration");
                return Err(err);
            }
        };

        let disposed = {
            let mut slot = self.slot.lock();
            slot.registration = Some(registration);
            slot.disposed
        };
        if disposed {
            self.source.unregister(registration);
        }

        dispatcher.gate.wait();

        if dispatcher.handle.state() == SubscriptionState::Disposed {
            return Err(BridgeError::Disposed);
        }

        // Any error seen by now fails the call, even one that followed the ack.
        if let Some(error) = dispatcher.handle.captured_error() {
            dispatcher
                .handle
                .transition(SubscriptionState::Acknowledged, SubscriptionState::Failed);
            return Err(self.fail(SubscriptionFailure { target, error }));
        }

        if !dispatcher
            .handle
            .transition(SubscriptionState::Acknowledged, SubscriptionState::Streaming)
        {
            return Err(BridgeError::Disposed);
        }

        debug!(remote = %target, registration = %registration, "subscription streaming");
        Ok(())
    }

    /// [`subscribe`](Self::subscribe) with the configured namespace and dialect.
    pub fn subscribe_query(&self, target: &str, query: &str, timeout_ms: u32) -> Result<()> {
        let request = SubscriptionRequest::new(query)
            .with_namespace(self.config.default_namespace.as_str())
            .with_dialect(self.config.default_dialect.as_str())
            .with_timeout_ms(timeout_ms);
        self.subscribe(target, request)
    }

    fn fail(&self, failure: SubscriptionFailure) -> BridgeError {
        let sink: Arc<dyn FailureSink> = match self.strict_failure.read().clone() {
            Some(sink) => sink,
            None => Arc::new(ReturnFailure),
        };
        debug!(remote = %failure.target, error = %failure.error, "routing subscription failure");
        sink.fail(failure)
    }

    /// Stop processing notifications and unregister from the source.
    ///
    /// Notifications already being handled on another thread may still reach
    /// the observer. A `subscribe` still waiting returns
    /// [`BridgeError::Disposed`].
    pub fn dispose(&self) {
        let (dispatcher, registration) = {
            let mut slot = self.slot.lock();
            if slot.disposed {
                return;
            }
            slot.disposed = true;
            (slot.dispatcher.clone(), slot.registration.take())
        };

        if let Some(dispatcher) = dispatcher {
            dispatcher.handle.dispose();
            dispatcher.gate.resolve();
            debug!(remote = %dispatcher.handle.target(), "subscription disposed");
        }
        if let Some(id) = registration {
            self.source.unregister(id);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.slot.lock().disposed
    }

    fn dispatcher(&self) -> Option<Arc<Dispatcher>> {
        self.slot.lock().dispatcher.clone()
    }

    /// Target of the subscription, once `subscribe` has been called.
    pub fn target(&self) -> Option<TargetId> {
        self.dispatcher().map(|d| d.handle.target().clone())
    }

    pub fn state(&self) -> Option<SubscriptionState> {
        self.dispatcher().map(|d| d.handle.state())
    }

    /// The first error the subscription saw.
    pub fn captured_error(&self) -> Option<RemoteError> {
        self.dispatcher().and_then(|d| d.handle.captured_error())
    }

    pub fn registration(&self) -> Option<RegistrationId> {
        self.slot.lock().registration
    }

    pub fn stats(&self) -> BridgeStats {
        self.dispatcher()
            .map(|d| d.handle.stats())
            .unwrap_or_default()
    }
}

impl Drop for IndicationBridge {
    fn drop(&mut self) {
        self.dispose();
    }
}
