//! # Authoritative-thread rendezvous.
//!
//! Every delivery that touches connection or world state is marshalled through
//! [`MainThread`]. The built-in implementation is a pair:
//!
//! ```text
//! any thread:      TickQueue::execute(job) ──► [unbounded mpsc] ──┐
//!                                                                 ▼
//! authoritative:   TickDrain::run_pending()   (once per tick, non-blocking)
//!             or   TickDrain::run(token)      (dedicated single task)
//! ```
//!
//! ## Rules
//! - Each job runs exactly once, on the thread that owns the [`TickDrain`].
//! - Jobs run in submission order; callers must not depend on it.
//! - Once the drain is dropped, new jobs are discarded.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::QueueError;

/// Unit of work for the authoritative thread.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Single-threaded executor owning connection and world state.
pub trait MainThread: Send + Sync + 'static {
    /// Schedules `job` to run once on the authoritative thread.
    fn execute(&self, job: Job);
}

/// Sending half of the authoritative queue.
#[derive(Clone)]
pub struct TickQueue {
    tx: mpsc::UnboundedSender<Job>,
}

/// Receiving half, owned by the authoritative thread.
pub struct TickDrain {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl TickQueue {
    /// Creates a connected queue/drain pair.
    pub fn new() -> (TickQueue, TickDrain) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TickQueue { tx }, TickDrain { rx })
    }

    /// Schedules `job`, failing if the drain is gone.
    pub fn try_execute(&self, job: Job) -> Result<(), QueueError> {
        self.tx.send(job).map_err(|_| QueueError::Closed)
    }
}

impl MainThread for TickQueue {
    fn execute(&self, job: Job) {
        let _ = self.try_execute(job);
    }
}

impl TickDrain {
    /// Runs every job queued so far and returns how many ran. Never blocks.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Runs jobs as they arrive until `token` is cancelled or all queues are dropped.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                job = self.rx.recv() => match job {
                    Some(job) => job(),
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_pending_drains_in_order() {
        let (queue, mut drain) = TickQueue::new();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            queue.execute(Box::new(move || seen.lock().unwrap().push(i)));
        }

        assert_eq!(drain.run_pending(), 3);
        assert_eq!(drain.run_pending(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn closed_drain_rejects() {
        let (queue, drain) = TickQueue::new();
        drop(drain);
        assert_eq!(queue.try_execute(Box::new(|| {})), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn run_stops_on_cancel() {
        let (queue, drain) = TickQueue::new();
        let token = CancellationToken::new();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ran);
        queue.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let stop = token.clone();
        let counter = Arc::clone(&ran);
        queue.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            stop.cancel();
        }));

        drain.run(token).await;
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }
}
