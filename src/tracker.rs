//! Resolution tracker
//!
//! The tracker records which keys have a factory invocation in flight.
//! Each in-flight invocation owns an [`InFlight`] slot: the invocation
//! settles it exactly once, and every caller interested in the key waits
//! on it with its own deadline.

use crate::storage::Instance;
use crate::{CancellationToken, Result, TypeKey};
use ahash::RandomState;
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Completion slot for one factory invocation
pub(crate) struct InFlight {
    outcome: Mutex<Option<Result<Instance>>>,
    settled: Condvar,
    token: CancellationToken,
    started: Instant,
}

impl InFlight {
    pub fn new(token: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(None),
            settled: Condvar::new(),
            token,
            started: Instant::now(),
        })
    }

    /// Cancellation token handed to the factory
    #[inline]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[cfg(test)]
    pub fn is_settled(&self) -> bool {
        self.outcome.lock().is_some()
    }

    /// Block until the slot is settled or the deadline passes.
    ///
    /// Returns `None` on deadline.
    pub fn wait_until(&self, deadline: Instant) -> Option<Result<Instance>> {
        let mut outcome = self.outcome.lock();
        while outcome.is_none() {
            if self.settled.wait_until(&mut outcome, deadline).timed_out() {
                break;
            }
        }
        outcome.clone()
    }

    /// Settle the slot unless someone already did.
    ///
    /// `finish` runs with the slot locked, so exactly one settler gets to
    /// produce the outcome; later settlers receive the stored one. It may
    /// take the registry lock, never the other way round.
    pub fn settle_with<F>(&self, finish: F) -> Result<Instance>
    where
        F: FnOnce() -> Result<Instance>,
    {
        let mut outcome = self.outcome.lock();
        if let Some(existing) = outcome.as_ref() {
            return existing.clone();
        }
        let result = finish();
        *outcome = Some(result.clone());
        self.settled.notify_all();
        result
    }
}

/// Keys with a factory invocation in flight
#[derive(Default)]
pub(crate) struct ResolutionTracker {
    resolving: HashMap<TypeKey, Arc<InFlight>, RandomState>,
}

impl ResolutionTracker {
    #[inline]
    pub fn get(&self, key: &TypeKey) -> Option<Arc<InFlight>> {
        self.resolving.get(key).map(Arc::clone)
    }

    #[inline]
    pub fn is_resolving(&self, key: &TypeKey) -> bool {
        self.resolving.contains_key(key)
    }

    /// Set the mark for `key`
    #[inline]
    pub fn mark(&mut self, key: TypeKey, flight: Arc<InFlight>) {
        self.resolving.insert(key, flight);
    }

    /// Clear the mark, but only if it still belongs to `flight`
    pub fn clear(&mut self, key: &TypeKey, flight: &Arc<InFlight>) -> bool {
        match self.resolving.get(key) {
            Some(current) if Arc::ptr_eq(current, flight) => {
                self.resolving.remove(key);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.resolving.len()
    }

    pub fn keys(&self) -> Vec<TypeKey> {
        self.resolving.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiError;
    use std::thread;

    struct Logger;

    #[test]
    fn test_mark_and_clear() {
        let mut tracker = ResolutionTracker::default();
        let key = TypeKey::of::<Logger>();
        let flight = InFlight::new(CancellationToken::new());

        tracker.mark(key, Arc::clone(&flight));
        assert!(tracker.is_resolving(&key));
        assert_eq!(tracker.keys(), vec![key]);

        assert!(tracker.clear(&key, &flight));
        assert!(!tracker.is_resolving(&key));
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_clear_ignores_stale_flight() {
        let mut tracker = ResolutionTracker::default();
        let key = TypeKey::of::<Logger>();
        let stale = InFlight::new(CancellationToken::new());
        let current = InFlight::new(CancellationToken::new());

        tracker.mark(key, Arc::clone(&current));
        assert!(!tracker.clear(&key, &stale));
        assert!(tracker.is_resolving(&key));
    }

    #[test]
    fn test_wait_times_out() {
        let flight = InFlight::new(CancellationToken::new());
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(flight.wait_until(deadline).is_none());
        assert!(!flight.is_settled());
    }

    #[test]
    fn test_settle_wakes_waiters() {
        let flight = InFlight::new(CancellationToken::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let flight = Arc::clone(&flight);
                thread::spawn(move || {
                    flight.wait_until(Instant::now() + Duration::from_secs(5))
                })
            })
            .collect();

        let instance: Instance = Arc::new(7_u32);
        flight.settle_with(|| Ok(Arc::clone(&instance))).unwrap();

        for waiter in waiters {
            let got = waiter.join().unwrap().unwrap().unwrap();
            assert!(Arc::ptr_eq(&got, &instance));
        }
    }

    #[test]
    fn test_first_settler_wins() {
        let flight = InFlight::new(CancellationToken::new());
        let key = TypeKey::of::<Logger>();

        let first = flight.settle_with(|| Err(DiError::NotRegistered { key }));
        let second = flight.settle_with(|| Ok(Arc::new(1_u8) as Instance));

        assert!(first.is_err());
        assert!(matches!(second, Err(DiError::NotRegistered { .. })));
        assert!(flight.is_settled());
    }
}
