//! # Non-blocking slot limiter.
//!
//! [`SlotLimiter`] is an atomic in-flight counter with reject-don't-wait admission:
//! [`try_acquire`](SlotLimiter::try_acquire) either reserves a slot immediately or
//! returns `None`. It never parks the caller, which is why it is used instead of a
//! semaphore on the submission path.
//!
//! ## Rules
//! - With `Some(limit)`, the counter never exceeds `limit` (CAS retry loop).
//! - With `None` the limiter only counts; every acquire succeeds.
//! - A reservation is a [`SlotPermit`]; dropping it releases the slot exactly once.
//! - Release is clamped at zero, the counter never goes negative.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free bounded counter.
#[derive(Debug, Default)]
pub struct SlotLimiter {
    in_flight: AtomicUsize,
}

impl SlotLimiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reserves one slot if fewer than `limit` are taken.
    ///
    /// `None` means unlimited: always admits, still counts.
    pub fn try_acquire(self: &Arc<Self>, limit: Option<usize>) -> Option<SlotPermit> {
        match limit {
            None => {
                self.in_flight.fetch_add(1, Ordering::AcqRel);
            }
            Some(limit) => {
                let mut current = self.in_flight.load(Ordering::Acquire);
                loop {
                    if current >= limit {
                        return None;
                    }
                    match self.in_flight.compare_exchange_weak(
                        current,
                        current + 1,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => break,
                        Err(actual) => current = actual,
                    }
                }
            }
        }
        Some(SlotPermit {
            limiter: Arc::clone(self),
        })
    }

    /// Number of slots currently reserved.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn release(&self) {
        let _ = self
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });
    }
}

/// One reserved slot. Released on drop.
#[must_use = "dropping a permit releases its slot immediately"]
#[derive(Debug)]
pub struct SlotPermit {
    limiter: Arc<SlotLimiter>,
}

impl Drop for SlotPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_rejects_at_limit() {
        let limiter = SlotLimiter::new();
        let a = limiter.try_acquire(Some(2));
        let b = limiter.try_acquire(Some(2));
        assert!(a.is_some() && b.is_some());
        assert!(limiter.try_acquire(Some(2)).is_none());
        assert_eq!(limiter.in_flight(), 2);

        drop(a);
        assert_eq!(limiter.in_flight(), 1);
        assert!(limiter.try_acquire(Some(2)).is_some());
    }

    #[test]
    fn unlimited_always_admits_and_counts() {
        let limiter = SlotLimiter::new();
        let permits: Vec<_> = (0..100).map(|_| limiter.try_acquire(None)).collect();
        assert!(permits.iter().all(Option::is_some));
        assert_eq!(limiter.in_flight(), 100);

        drop(permits);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn release_is_clamped_at_zero() {
        let limiter = SlotLimiter::new();
        limiter.release();
        assert_eq!(limiter.in_flight(), 0);
    }

    #[test]
    fn concurrent_acquire_never_exceeds_limit() {
        let limiter = SlotLimiter::new();
        let peak = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|s| {
            for _ in 0..8 {
                let limiter = Arc::clone(&limiter);
                let peak = Arc::clone(&peak);
                s.spawn(move || {
                    for _ in 0..1_000 {
                        if let Some(permit) = limiter.try_acquire(Some(3)) {
                            peak.fetch_max(limiter.in_flight(), Ordering::AcqRel);
                            drop(permit);
                        }
                    }
                });
            }
        });

        assert!(peak.load(Ordering::Acquire) <= 3);
        assert_eq!(limiter.in_flight(), 0);
    }
}
