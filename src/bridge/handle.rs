//! Per-subscription state shared between the subscriber and delivery threads.

use crate::types::{RemoteError, SubscriptionRequest, TargetId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

/// Where a subscription is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SubscriptionState {
    /// Registered, waiting for an ack or a failure.
    Pending = 0,
    /// Ack received; `subscribe` has not returned yet.
    Acknowledged = 1,
    /// An error arrived before `subscribe` returned.
    Failed = 2,
    /// `subscribe` returned successfully; events flow to the observer.
    Streaming = 3,
    /// Torn down. Terminal.
    Disposed = 4,
}

impl SubscriptionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriptionState::Pending,
            1 => SubscriptionState::Acknowledged,
            2 => SubscriptionState::Failed,
            3 => SubscriptionState::Streaming,
            _ => SubscriptionState::Disposed,
        }
    }
}

/// Delivery counters for one subscription.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStats {
    pub forwarded_results: u64,
    pub forwarded_errors: u64,
    /// Notifications dropped after disposal, duplicate acks and diagnostics.
    pub discarded: u64,
}

/// Mutable state of a single subscription.
pub struct SubscriptionHandle {
    target: TargetId,
    request: SubscriptionRequest,
    disposed: AtomicBool,
    state: AtomicU8,
    /// First error seen; never overwritten.
    captured_error: Mutex<Option<RemoteError>>,
    forwarded_results: AtomicU64,
    forwarded_errors: AtomicU64,
    discarded: AtomicU64,
}

impl SubscriptionHandle {
    pub fn new(target: TargetId, request: SubscriptionRequest) -> Self {
        Self {
            target,
            request,
            disposed: AtomicBool::new(false),
            state: AtomicU8::new(SubscriptionState::Pending as u8),
            captured_error: Mutex::new(None),
            forwarded_results: AtomicU64::new(0),
            forwarded_errors: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> &TargetId {
        &self.target
    }

    pub fn request(&self) -> &SubscriptionRequest {
        &self.request
    }

    pub fn timeout_ms(&self) -> u32 {
        self.request.timeout_ms
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Mark disposed. Returns true only for the first call.
    pub fn dispose(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::AcqRel);
        self.state
            .store(SubscriptionState::Disposed as u8, Ordering::Release);
        first
    }

    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move `from` -> `to` atomically. Fails if the state is not `from`.
    pub fn transition(&self, from: SubscriptionState, to: SubscriptionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record `error` unless an earlier one is already held.
    pub fn capture_error(&self, error: &RemoteError) -> bool {
        let mut captured = self.captured_error.lock();
        if captured.is_some() {
            return false;
        }
        *captured = Some(error.clone());
        true
    }

    pub fn captured_error(&self) -> Option<RemoteError> {
        self.captured_error.lock().clone()
    }

    pub(crate) fn count_result(&self) {
        self.forwarded_results.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_error(&self) {
        self.forwarded_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn count_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            forwarded_results: self.forwarded_results.load(Ordering::Relaxed),
            forwarded_errors: self.forwarded_errors.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
