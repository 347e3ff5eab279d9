//! Where handshake failures go.

use crate::error::BridgeError;
use crate::types::{RemoteError, TargetId};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// A subscription that failed before it was acknowledged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionFailure {
    pub target: TargetId,
    pub error: RemoteError,
}

/// Receives handshake failures.
///
/// The error returned from [`FailureSink::fail`] is what `subscribe` returns.
pub trait FailureSink: Send + Sync {
    fn fail(&self, failure: SubscriptionFailure) -> BridgeError;
}

/// Default sink: the failure becomes the `subscribe` error.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReturnFailure;

impl FailureSink for ReturnFailure {
    fn fail(&self, failure: SubscriptionFailure) -> BridgeError {
        BridgeError::SubscriptionFailed {
            target: failure.target,
            source: failure.error,
        }
    }
}

/// A host execution context that is torn down by the first failure routed to it.
///
/// The failure itself is delivered on a channel; `subscribe` only reports
/// [`BridgeError::Terminated`].
pub struct TerminatingContext {
    terminated: AtomicBool,
    sender: Sender<SubscriptionFailure>,
    receiver: Receiver<SubscriptionFailure>,
}

impl TerminatingContext {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            terminated: AtomicBool::new(false),
            sender,
            receiver,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Failures routed here, in arrival order.
    pub fn failures(&self) -> Receiver<SubscriptionFailure> {
        self.receiver.clone()
    }
}

impl Default for TerminatingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FailureSink for TerminatingContext {
    fn fail(&self, failure: SubscriptionFailure) -> BridgeError {
        self.terminated.store(true, Ordering::Release);
        let target = failure.target.clone();
        let _ = self.sender.send(failure);
        BridgeError::Terminated { target }
    }
}
