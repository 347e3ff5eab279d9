//! Error handling and edge case tests.

use indication_bridge::{
    BridgeError, ChannelObserver, FailureSink, IndicationBridge, MemorySource,
    MemorySourceConfig, Notification, NotificationHandler, NotificationSource, RegistrationId,
    RemoteError, RemoteErrorKind, SubscribeReply, SubscriptionRequest, SubscriptionState,
    TargetId, TerminatingContext,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn rejecting_source(error: RemoteError) -> Arc<MemorySource> {
    Arc::new(MemorySource::with_config(MemorySourceConfig {
        reply: SubscribeReply::Reject(error),
        ..Default::default()
    }))
}

/// Source that counts registrations and refuses every one.
#[derive(Default)]
struct RefusingSource {
    registrations: AtomicUsize,
}

impl NotificationSource for RefusingSource {
    fn register(
        &self,
        _target: &TargetId,
        _request: &SubscriptionRequest,
        _handler: Arc<dyn NotificationHandler>,
    ) -> indication_bridge::Result<RegistrationId> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Err(BridgeError::Registration("session closed".to_string()))
    }

    fn unregister(&self, _id: RegistrationId) {}
}

// --- Argument Errors ---

#[test]
fn test_empty_target_fails_before_registration() {
    let source = Arc::new(RefusingSource::default());
    let bridge = IndicationBridge::new(source.clone(), Arc::new(ChannelObserver::new()));

    let result = bridge.subscribe("", SubscriptionRequest::new("q"));

    assert!(matches!(result, Err(BridgeError::InvalidArgument(_))));
    assert_eq!(source.registrations.load(Ordering::SeqCst), 0);
    assert!(bridge.state().is_none());
}

#[test]
fn test_blank_target_fails_before_registration() {
    let source = Arc::new(MemorySource::new());
    let bridge = IndicationBridge::new(source.clone(), Arc::new(ChannelObserver::new()));

    let result = bridge.subscribe_query("  ", "q", 100);

    assert!(matches!(result, Err(BridgeError::InvalidArgument(_))));
    assert_eq!(source.active_registrations(), 0);
}

#[test]
fn test_invalid_target_leaves_bridge_usable() {
    let source = Arc::new(MemorySource::new());
    let bridge = IndicationBridge::new(source, Arc::new(ChannelObserver::new()));

    assert!(bridge.subscribe("", SubscriptionRequest::new("q")).is_err());
    bridge
        .subscribe("node-7", SubscriptionRequest::new("q"))
        .unwrap();
}

// --- Source Errors ---

#[test]
fn test_registration_refused() {
    let source = Arc::new(RefusingSource::default());
    let bridge = IndicationBridge::new(source.clone(), Arc::new(ChannelObserver::new()));

    let result = bridge.subscribe("node-7", SubscriptionRequest::new("q"));

    assert!(matches!(result, Err(BridgeError::Registration(_))));
    assert_eq!(source.registrations.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.state(), Some(SubscriptionState::Failed));
}

#[test]
fn test_failure_message_names_target() {
    let bridge = IndicationBridge::new(
        rejecting_source(RemoteError::new(RemoteErrorKind::AccessDenied, "no rights")),
        Arc::new(ChannelObserver::new()),
    );

    let err = bridge
        .subscribe("node-7", SubscriptionRequest::new("q"))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Subscription on node-7 failed: access denied: no rights"
    );
}

// --- Strict Failure Target ---

#[test]
fn test_strict_target_receives_failure() {
    let bridge = IndicationBridge::new(
        rejecting_source(RemoteError::new(RemoteErrorKind::InvalidQuery, "bad query")),
        Arc::new(ChannelObserver::new()),
    );
    let context = Arc::new(TerminatingContext::new());
    let failures = context.failures();
    bridge.set_strict_failure_target(Some(context.clone()));

    let err = bridge
        .subscribe("node-7", SubscriptionRequest::new("q"))
        .unwrap_err();

    assert!(matches!(err, BridgeError::Terminated { ref target } if target.as_str() == "node-7"));
    assert!(err.remote().is_none());
    assert!(context.is_terminated());

    let failure = failures.try_recv().unwrap();
    assert_eq!(failure.target.as_str(), "node-7");
    assert_eq!(failure.error.kind, RemoteErrorKind::InvalidQuery);
}

#[test]
fn test_strict_target_can_be_cleared() {
    let bridge = IndicationBridge::new(
        rejecting_source(RemoteError::new(RemoteErrorKind::Rejected, "no")),
        Arc::new(ChannelObserver::new()),
    );
    let context = Arc::new(TerminatingContext::new());
    bridge.set_strict_failure_target(Some(context.clone()));
    bridge.set_strict_failure_target(None);

    let err = bridge
        .subscribe("node-7", SubscriptionRequest::new("q"))
        .unwrap_err();

    assert!(matches!(err, BridgeError::SubscriptionFailed { .. }));
    assert!(!context.is_terminated());
}

#[test]
fn test_custom_failure_sink() {
    struct Relabel;

    impl FailureSink for Relabel {
        fn fail(&self, failure: indication_bridge::SubscriptionFailure) -> BridgeError {
            BridgeError::Registration(format!("{} refused", failure.target))
        }
    }

    let bridge = IndicationBridge::new(
        rejecting_source(RemoteError::new(RemoteErrorKind::Rejected, "no")),
        Arc::new(ChannelObserver::new()),
    );
    bridge.set_strict_failure_target(Some(Arc::new(Relabel)));

    let err = bridge
        .subscribe("node-7", SubscriptionRequest::new("q"))
        .unwrap_err();
    assert_eq!(err.to_string(), "Registration error: node-7 refused");
}

#[test]
fn test_late_error_does_not_reach_strict_target() {
    let source = Arc::new(MemorySource::new());
    let observer = Arc::new(ChannelObserver::new());
    let events = observer.receiver();
    let bridge = IndicationBridge::new(source.clone(), observer);
    let context = Arc::new(TerminatingContext::new());
    bridge.set_strict_failure_target(Some(context.clone()));

    bridge
        .subscribe("node-7", SubscriptionRequest::new("q"))
        .unwrap();
    source
        .emit(
            bridge.registration().unwrap(),
            Notification::error(RemoteError::new(RemoteErrorKind::Transport, "lost")),
        )
        .unwrap();

    assert!(events
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .is_error());
    assert!(!context.is_terminated());
}

// --- Lifecycle Errors ---

#[test]
fn test_second_subscribe_rejected() {
    let bridge = IndicationBridge::new(
        Arc::new(MemorySource::new()),
        Arc::new(ChannelObserver::new()),
    );
    bridge
        .subscribe("node-7", SubscriptionRequest::new("q"))
        .unwrap();

    let result = bridge.subscribe("node-7", SubscriptionRequest::new("q"));
    assert!(matches!(result, Err(BridgeError::AlreadySubscribed)));
}

#[test]
fn test_subscribe_after_dispose() {
    let source = Arc::new(MemorySource::new());
    let bridge = IndicationBridge::new(source.clone(), Arc::new(ChannelObserver::new()));
    bridge.dispose();

    let result = bridge.subscribe("node-7", SubscriptionRequest::new("q"));
    assert!(matches!(result, Err(BridgeError::Disposed)));
    assert_eq!(source.active_registrations(), 0);
}

#[test]
fn test_dispose_before_subscribe_is_harmless() {
    let bridge = IndicationBridge::new(
        Arc::new(MemorySource::new()),
        Arc::new(ChannelObserver::new()),
    );
    bridge.dispose();
    bridge.dispose();
    assert!(bridge.is_disposed());
    assert_eq!(bridge.stats(), Default::default());
}
