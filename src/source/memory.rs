//! In-process notification source.
//!
//! Deliveries go through a single dispatcher thread, so notifications for a
//! registration arrive one at a time and in the order they were emitted, on a
//! thread other than the emitter's. The source also owns operation timeouts:
//! a registration with a non-zero `timeout_ms` that is not settled by its
//! deadline receives a timeout error. Deadlines are kept by the dispatcher
//! itself; no thread is started per registration.

use crate::error::{BridgeError, Result};
use crate::notification::Notification;
use crate::types::{RegistrationId, RemoteError, SubscriptionRequest, TargetId};
use crossbeam_channel::{at, bounded, never, select, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::{NotificationHandler, NotificationSource};

/// How the source answers a new registration.
#[derive(Clone, Debug, Default)]
pub enum SubscribeReply {
    /// Deliver an ack marker.
    #[default]
    Accept,
    /// Deliver this error.
    Reject(RemoteError),
    /// Deliver nothing; only the operation timeout (if any) will answer.
    Silent,
}

/// Memory source configuration.
#[derive(Clone, Debug)]
pub struct MemorySourceConfig {
    /// Reply sent to every new registration.
    pub reply: SubscribeReply,

    /// Max queued jobs before `emit` blocks.
    /// Default: 1024
    pub queue_capacity: usize,
}

impl Default for MemorySourceConfig {
    fn default() -> Self {
        Self {
            reply: SubscribeReply::Accept,
            queue_capacity: 1024,
        }
    }
}

enum Job {
    Deliver {
        id: RegistrationId,
        notification: Notification,
    },
    Arm {
        id: RegistrationId,
        timeout_ms: u32,
        deadline: Instant,
    },
    Shutdown,
}

struct Entry {
    target: TargetId,
    handler: Arc<dyn NotificationHandler>,
    /// An ack or error has been delivered; the timeout no longer applies.
    settled: Arc<AtomicBool>,
}

struct Shared {
    registrations: RwLock<HashMap<RegistrationId, Entry>>,
}

impl Shared {
    fn handler_for(
        &self,
        id: RegistrationId,
    ) -> Option<(Arc<dyn NotificationHandler>, Arc<AtomicBool>)> {
        self.registrations
            .read()
            .get(&id)
            .map(|entry| (Arc::clone(&entry.handler), Arc::clone(&entry.settled)))
    }

    /// Hand a notification to its registration's handler.
    fn deliver(&self, id: RegistrationId, notification: Notification) {
        let Some((handler, settled)) = self.handler_for(id) else {
            debug!(
                registration = %id,
                kind = notification.kind(),
                "dropping notification for unknown registration"
            );
            return;
        };

        if matches!(
            notification,
            Notification::AckMarker | Notification::Error { .. }
        ) {
            settled.store(true, Ordering::Release);
        }

        trace!(registration = %id, kind = notification.kind(), "delivering notification");
        handler.on_notification(notification);
    }

    fn expire(&self, id: RegistrationId, timeout_ms: u32) {
        let Some((handler, settled)) = self.handler_for(id) else {
            return;
        };
        if settled.swap(true, Ordering::AcqRel) {
            return;
        }

        let target = self.registrations.read().get(&id).map(|e| e.target.clone());
        let mut error = RemoteError::timeout(timeout_ms);
        error.target = target;

        debug!(registration = %id, timeout_ms, "operation timed out before acknowledgement");
        handler.on_notification(Notification::error(error));
    }
}

/// A notification source living entirely in this process.
pub struct MemorySource {
    config: MemorySourceConfig,
    shared: Arc<Shared>,
    queue: Sender<Job>,
    next_id: AtomicU64,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    dispatcher_thread: Option<ThreadId>,
}

impl MemorySource {
    /// Create a source that accepts every registration.
    pub fn new() -> Self {
        Self::with_config(MemorySourceConfig::default())
    }

    pub fn with_config(config: MemorySourceConfig) -> Self {
        let shared = Arc::new(Shared {
            registrations: RwLock::new(HashMap::new()),
        });
        let (queue, jobs) = bounded(config.queue_capacity);

        let dispatcher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("memory-source-dispatch".to_string())
                .spawn(move || dispatch_loop(shared, jobs))
        };
        let dispatcher = match dispatcher {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "failed to start dispatcher; source is closed");
                None
            }
        };
        let dispatcher_thread = dispatcher.as_ref().map(|handle| handle.thread().id());

        Self {
            config,
            shared,
            queue,
            next_id: AtomicU64::new(1),
            dispatcher: Mutex::new(dispatcher),
            dispatcher_thread,
        }
    }

    /// Queue a notification for a registration.
    ///
    /// Blocks while the queue is full, except when called from a delivery
    /// callback running on the dispatcher thread: there a full queue fails
    /// with [`BridgeError::QueueFull`] instead of waiting on itself.
    pub fn emit(&self, id: RegistrationId, notification: Notification) -> Result<()> {
        self.enqueue(Job::Deliver { id, notification })
    }

    fn enqueue(&self, job: Job) -> Result<()> {
        if self.dispatcher_thread == Some(thread::current().id()) {
            return self.queue.try_send(job).map_err(|err| match err {
                TrySendError::Full(_) => BridgeError::QueueFull,
                TrySendError::Disconnected(_) => BridgeError::SourceClosed,
            });
        }
        self.queue.send(job).map_err(|_| BridgeError::SourceClosed)
    }

    /// Deliver a notification on the calling thread, bypassing the queue.
    ///
    /// Gives up the one-at-a-time guarantee when called from several threads.
    pub fn deliver_now(&self, id: RegistrationId, notification: Notification) {
        self.shared.deliver(id, notification);
    }

    /// Number of live registrations.
    pub fn active_registrations(&self) -> usize {
        self.shared.registrations.read().len()
    }

    /// Ids of live registrations, lowest first.
    pub fn registration_ids(&self) -> Vec<RegistrationId> {
        let mut ids: Vec<_> = self.shared.registrations.read().keys().copied().collect();
        ids.sort_by_key(|id| id.0);
        ids
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSource for MemorySource {
    fn register(
        &self,
        target: &TargetId,
        request: &SubscriptionRequest,
        handler: Arc<dyn NotificationHandler>,
    ) -> Result<RegistrationId> {
        if self.dispatcher.lock().is_none() {
            return Err(BridgeError::SourceClosed);
        }

        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.shared.registrations.write().insert(
            id,
            Entry {
                target: target.clone(),
                handler,
                settled: Arc::new(AtomicBool::new(false)),
            },
        );

        if request.timeout_ms > 0 {
            let deadline = Instant::now() + Duration::from_millis(u64::from(request.timeout_ms));
            let armed = self.enqueue(Job::Arm {
                id,
                timeout_ms: request.timeout_ms,
                deadline,
            });
            if let Err(err) = armed {
                self.shared.registrations.write().remove(&id);
                return Err(err);
            }
        }

        debug!(
            registration = %id,
            remote = %target,
            namespace = %request.namespace,
            dialect = %request.dialect,
            query = %request.query,
            "registered subscription"
        );

        match &self.config.reply {
            SubscribeReply::Accept => self.emit(id, Notification::AckMarker)?,
            SubscribeReply::Reject(error) => {
                let error = error.clone().with_target(target.clone());
                self.emit(id, Notification::error(error))?
            }
            SubscribeReply::Silent => {}
        }

        Ok(id)
    }

    fn unregister(&self, id: RegistrationId) {
        if self.shared.registrations.write().remove(&id).is_some() {
            debug!(registration = %id, "unregistered subscription");
        }
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        // A full queue on the dispatcher thread skips the shutdown job; the loop
        // still ends once this sender is gone and the queue drains.
        let _ = self.enqueue(Job::Shutdown);
        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

fn dispatch_loop(shared: Arc<Shared>, jobs: Receiver<Job>) {
    // Keyed by deadline, then registration id so equal instants don't collide.
    let mut deadlines: BTreeMap<(Instant, u64), u32> = BTreeMap::new();

    loop {
        let timer = match deadlines.keys().next() {
            Some((deadline, _)) => at(*deadline),
            None => never(),
        };

        select! {
            recv(jobs) -> job => match job {
                Ok(Job::Deliver { id, notification }) => shared.deliver(id, notification),
                Ok(Job::Arm { id, timeout_ms, deadline }) => {
                    deadlines.insert((deadline, id.0), timeout_ms);
                }
                Ok(Job::Shutdown) | Err(_) => break,
            },
            recv(timer) -> _ => {
                let now = Instant::now();
                while let Some(entry) = deadlines.first_entry() {
                    if entry.key().0 > now {
                        break;
                    }
                    let ((_, id), timeout_ms) = entry.remove_entry();
                    shared.expire(RegistrationId(id), timeout_ms);
                }
            }
        }
    }
}
