//! One-shot latch coordinating a blocked subscriber with notification delivery.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A latch that resolves once and stays resolved.
///
/// Any number of threads may call [`AckGate::resolve`]; only the first has an
/// effect. Waiters block on a condition variable and never spin.
pub struct AckGate {
    resolved: Mutex<bool>,
    cond: Condvar,
}

impl AckGate {
    pub fn new() -> Self {
        Self {
            resolved: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Resolve the gate, waking every waiter.
    ///
    /// Returns true for the call that performed the transition, false for
    /// every later call.
    pub fn resolve(&self) -> bool {
        let mut resolved = self.resolved.lock();
        if *resolved {
            return false;
        }
        *resolved = true;
        self.cond.notify_all();
        true
    }

    pub fn is_resolved(&self) -> bool {
        *self.resolved.lock()
    }

    /// Block until the gate is resolved.
    pub fn wait(&self) {
        let mut resolved = self.resolved.lock();
        while !*resolved {
            self.cond.wait(&mut resolved);
        }
    }

    /// Block until the gate is resolved or `timeout` elapses.
    ///
    /// Returns whether the gate is resolved.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut resolved = self.resolved.lock();
        if !*resolved {
            // Spurious wakeups are absorbed by the predicate.
            self.cond
                .wait_while_for(&mut resolved, |resolved| !*resolved, timeout);
        }
        *resolved
    }
}

impl Default for AckGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_first_resolve_wins() {
        let gate = AckGate::new();
        assert!(!gate.is_resolved());
        assert!(gate.resolve());
        assert!(!gate.resolve());
        assert!(gate.is_resolved());
    }

    #[test]
    fn test_wait_returns_after_resolve() {
        let gate = Arc::new(AckGate::new());

        let resolver = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                gate.resolve();
            })
        };

        gate.wait();
        assert!(gate.is_resolved());
        resolver.join().unwrap();
    }

    #[test]
    fn test_wait_on_resolved_gate_is_immediate() {
        let gate = AckGate::new();
        gate.resolve();
        gate.wait();
        assert!(gate.wait_for(Duration::from_millis(0)));
    }

    #[test]
    fn test_wait_for_times_out() {
        let gate = AckGate::new();
        assert!(!gate.wait_for(Duration::from_millis(20)));
    }

    #[test]
    fn test_concurrent_resolve_single_winner() {
        let gate = Arc::new(AckGate::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if gate.resolve() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wakes_all_waiters() {
        let gate = Arc::new(AckGate::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        gate.resolve();

        for waiter in waiters {
            waiter.join().unwrap();
        }
    }
}
