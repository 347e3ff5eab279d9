//! Core types for indication subscriptions.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Namespace used when a request does not name one.
pub const DEFAULT_NAMESPACE: &str = "root/cimv2";

/// Query dialect used when a request does not name one.
pub const DEFAULT_DIALECT: &str = "WQL";

/// Correlation identity of the remote end a subscription targets.
///
/// Always non-blank; construct through [`TargetId::new`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetId(String);

impl TargetId {
    /// Validate and wrap a target name.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(BridgeError::InvalidArgument(
                "target must be a non-empty identity".to_string(),
            ));
        }
        Ok(TargetId(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TargetId {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        TargetId::new(value)
    }
}

impl From<TargetId> for String {
    fn from(target: TargetId) -> Self {
        target.0
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetId({})", self.0)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier a notification source hands out for a registration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId(pub u64);

impl fmt::Debug for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistrationId({})", self.0)
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What to subscribe to.
///
/// The query is opaque to the bridge; only the source interprets it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Namespace the query runs in.
    pub namespace: String,

    /// Query language of `query`.
    pub dialect: String,

    /// Filter expression selecting the indications to deliver.
    pub query: String,

    /// Operation timeout in milliseconds, enforced by the source.
    /// 0 means the source's own default.
    pub timeout_ms: u32,
}

impl SubscriptionRequest {
    /// Request with the default namespace and dialect.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            dialect: DEFAULT_DIALECT.to_string(),
            query: query.into(),
            timeout_ms: 0,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A delivered indication.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionResult {
    /// Position marker the source attaches for resuming delivery.
    pub bookmark: Option<String>,

    /// Machine that raised the indication.
    pub machine_id: Option<String>,

    /// The indication instance itself.
    pub instance: serde_json::Value,
}

impl SubscriptionResult {
    pub fn new(instance: serde_json::Value) -> Self {
        Self {
            bookmark: None,
            machine_id: None,
            instance,
        }
    }

    pub fn with_bookmark(mut self, bookmark: impl Into<String>) -> Self {
        self.bookmark = Some(bookmark.into());
        self
    }

    pub fn with_machine_id(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }
}

/// Broad class of a remote failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// The remote side refused the subscription.
    Rejected,
    /// The source gave up waiting.
    Timeout,
    AccessDenied,
    InvalidQuery,
    /// The underlying session or connection broke.
    Transport,
    Other,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteErrorKind::Rejected => "rejected",
            RemoteErrorKind::Timeout => "timeout",
            RemoteErrorKind::AccessDenied => "access denied",
            RemoteErrorKind::InvalidQuery => "invalid query",
            RemoteErrorKind::Transport => "transport",
            RemoteErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// A failure reported by the notification source.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
    /// Target the failure was raised for, when the source knows it.
    pub target: Option<TargetId>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            target: None,
        }
    }

    pub fn timeout(timeout_ms: u32) -> Self {
        Self::new(
            RemoteErrorKind::Timeout,
            format!("no acknowledgement within {}ms", timeout_ms),
        )
    }

    pub fn with_target(mut self, target: TargetId) -> Self {
        self.target = Some(target);
        self
    }
}
