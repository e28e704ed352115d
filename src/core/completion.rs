//! # Completion protocol.
//!
//! Runs exactly once per admitted task, on whichever thread finished the build
//! (inline on a synchronous launch fault, or as soon as cancellation abandons the build).
//!
//! ```text
//! complete(task, permits, outcome)
//!   1. remove task from registry (key + identity)
//!   2. drop permits              (client slot, global slot)
//!   3. cancelled?   → Cancelled event, stop
//!   4. Failed(e)    → warn!, PreparationFailed
//!                     └─ fallback_on_failure && live → main thread: send_sync
//!   5. Prepared(p)  → deliver_on_main_thread ? main thread : inline
//!                     └─ re-check cancelled && live → send_built
//! ```
//!
//! Deferred steps re-check cancellation and liveness right before touching the
//! connection; both may change while the job waits in the queue.

use std::any::Any;
use std::sync::Arc;

use tokio::task::JoinError;

use crate::config::DispatchConfig;
use crate::core::connection::Connection;
use crate::core::registry::{ClientTasks, Permits};
use crate::core::task::{DispatchTask, TaskState};
use crate::error::PrepareError;
use crate::events::{Event, EventKind};

/// How a build ended, as seen by the completion callback.
#[derive(Debug)]
pub(crate) enum Outcome<P> {
    Prepared(P),
    Failed(PrepareError),
    Cancelled,
}

impl<P> Outcome<P> {
    /// Maps a joined build into an outcome.
    ///
    /// An aborted join counts as cancellation; a panic counts as failure.
    pub fn from_join(res: Result<Result<P, PrepareError>, JoinError>) -> Self {
        match res {
            Ok(Ok(payload)) => Outcome::Prepared(payload),
            Ok(Err(err)) if err.is_cancellation() => Outcome::Cancelled,
            Ok(Err(err)) => Outcome::Failed(err),
            Err(err) if err.is_panic() => Outcome::Failed(PrepareError::Panicked {
                info: panic_message(err.into_panic()),
            }),
            Err(_) => Outcome::Cancelled,
        }
    }
}

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<C: Connection> ClientTasks<C> {
    /// Final bookkeeping for `task`. Consumes its permits.
    pub(crate) fn complete(
        &self,
        task: &Arc<DispatchTask<C>>,
        permits: Permits,
        outcome: Outcome<C::Payload>,
    ) {
        self.tasks
            .remove_if(&task.key(), |_, current| Arc::ptr_eq(current, task));
        drop(permits);

        if task.is_cancelled() {
            task.finish(TaskState::Cancelled);
            self.publish(EventKind::Cancelled, task.pos());
            return;
        }

        let cfg = self.shared().config();
        match outcome {
            Outcome::Cancelled => {
                task.finish(TaskState::Cancelled);
                self.publish(EventKind::Cancelled, task.pos());
            }
            Outcome::Failed(err) => {
                task.finish(TaskState::Failed);
                tracing::warn!(
                    client = %self.client(),
                    unit = %task.pos(),
                    prepare = self.shared().workers.prepare_name(),
                    error = %err,
                    "failed to asynchronously prepare payload"
                );
                self.shared().bus.publish(
                    Event::unit(EventKind::PreparationFailed, self.client(), task.pos())
                        .with_reason(err.as_message()),
                );
                self.fallback(task, &cfg);
            }
            Outcome::Prepared(payload) => {
                task.finish(TaskState::Completed);
                self.deliver(task, payload, &cfg);
            }
        }
    }

    /// Hands `payload` to the connection, inline or on the authoritative thread.
    fn deliver(&self, task: &Arc<DispatchTask<C>>, payload: C::Payload, cfg: &DispatchConfig) {
        let task = Arc::clone(task);
        let bus = self.shared().bus.clone();
        let client = self.client();

        let send = move || {
            if task.is_cancelled() || !task.connection().is_live() {
                return;
            }
            task.connection()
                .send_built(task.world(), task.pos(), payload);
            bus.publish(Event::unit(EventKind::Delivered, client, task.pos()));
        };

        if cfg.deliver_on_main_thread {
            self.shared().main_thread.execute(Box::new(send));
        } else {
            send();
        }
    }

    /// Schedules the synchronous send path for a failed build.
    fn fallback(&self, task: &Arc<DispatchTask<C>>, cfg: &DispatchConfig) {
        if !cfg.fallback_on_failure || !task.connection().is_live() {
            return;
        }

        let job = {
            let task = Arc::clone(task);
            let bus = self.shared().bus.clone();
            let client = self.client();
            move || {
                if task.is_cancelled() || !task.connection().is_live() {
                    return;
                }
                task.connection().send_sync(task.world(), task.pos());
                bus.publish(Event::unit(EventKind::FallbackDelivered, client, task.pos()));
            }
        };
        self.shared().main_thread.execute(Box::new(job));
        self.publish(EventKind::FallbackScheduled, task.pos());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_results_map_to_outcomes() {
        let ok = tokio::spawn(async { Ok::<u8, PrepareError>(7) }).await;
        assert!(matches!(Outcome::from_join(ok), Outcome::Prepared(7)));

        let failed = tokio::spawn(async { Err::<u8, _>(PrepareError::fail("io")) }).await;
        assert!(matches!(
            Outcome::from_join(failed),
            Outcome::Failed(PrepareError::Fail { .. })
        ));

        let gave_up = tokio::spawn(async { Err::<u8, _>(PrepareError::Canceled) }).await;
        assert!(matches!(Outcome::from_join(gave_up), Outcome::Cancelled));
    }

    #[tokio::test]
    async fn panics_are_failures() {
        let panicked = tokio::spawn(async {
            if true {
                panic!("serializer blew up");
            }
            Ok::<u8, PrepareError>(0)
        })
        .await;

        match Outcome::from_join(panicked) {
            Outcome::Failed(PrepareError::Panicked { info }) => {
                assert_eq!(info, "serializer blew up");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn aborted_join_is_cancellation() {
        let handle = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok::<u8, PrepareError>(0)
        });
        handle.abort();
        assert!(matches!(Outcome::from_join(handle.await), Outcome::Cancelled));
    }
}
