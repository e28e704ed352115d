//! # DispatchTask: one in-flight preparation.
//!
//! A task is created when its unit is admitted and lives in exactly one
//! [`ClientTasks`] entry until completion removes it.
//!
//! ## State machine
//! ```text
//! Created ──start()──► Running ──┬──► Completed   (payload built, handed to delivery)
//!                                ├──► Failed      (error, panic, rejected launch)
//!                                └──► Cancelled   (cancel()/timeout won, or build gave up)
//! ```
//!
//! ## Rules
//! - `cancelled` flips false → true at most once; only the winner cancels the timer,
//!   the token and the build handle.
//! - Cancellation never completes a task; the completion callback does, exactly once.
//! - The callback fires on build exit or on cancellation, whichever comes first. A
//!   build that ignores its token is abandoned and its slots are released at once.
//! - The timer holds a `Weak` to the task; firing after completion is a no-op.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::completion::Outcome;
use crate::core::connection::Connection;
use crate::core::registry::{ClientTasks, Permits};
use crate::events::{Event, EventKind};
use crate::unit::{UnitKey, UnitPos};

/// Lifecycle state of a [`DispatchTask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Created = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Failed,
            _ => TaskState::Cancelled,
        }
    }

    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

pub(crate) struct DispatchTask<C: Connection> {
    pos: UnitPos,
    conn: Arc<C>,
    world: Arc<C::World>,
    state: AtomicU8,
    cancelled: AtomicBool,
    /// Handed to the build; cancelled together with the flag.
    ctx: CancellationToken,
    build: OnceLock<AbortHandle>,
    timer: OnceLock<CancellationToken>,
}

impl<C: Connection> DispatchTask<C> {
    pub fn new(pos: UnitPos, conn: Arc<C>, world: Arc<C::World>) -> Arc<Self> {
        Arc::new(Self {
            pos,
            conn,
            world,
            state: AtomicU8::new(TaskState::Created as u8),
            cancelled: AtomicBool::new(false),
            ctx: CancellationToken::new(),
            build: OnceLock::new(),
            timer: OnceLock::new(),
        })
    }

    #[inline]
    pub fn key(&self) -> UnitKey {
        self.pos.key()
    }

    #[inline]
    pub fn pos(&self) -> UnitPos {
        self.pos
    }

    #[inline]
    pub fn connection(&self) -> &C {
        &self.conn
    }

    #[inline]
    pub fn world(&self) -> &C::World {
        &self.world
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Moves to a terminal state. Only the first call wins.
    pub fn finish(&self, to: TaskState) -> bool {
        debug_assert!(to.is_terminal());
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (!TaskState::from_u8(cur).is_terminal()).then_some(to as u8)
            })
            .is_ok()
    }

    /// Launches the build, arms the timeout and registers the completion callback.
    ///
    /// A synchronous launch fault completes the task as failed before returning.
    pub fn start(self: &Arc<Self>, owner: &Arc<ClientTasks<C>>, permits: Permits) {
        let shared = owner.shared();
        let cfg = shared.config();
        let _ = self.state.compare_exchange(
            TaskState::Created as u8,
            TaskState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );

        let build = match shared.workers.launch(
            cfg.executor,
            self.ctx.clone(),
            Arc::clone(&self.conn),
            Arc::clone(&self.world),
            self.pos,
        ) {
            Ok(build) => build,
            Err(err) => {
                owner.complete(self, permits, Outcome::Failed(err));
                return;
            }
        };
        self.attach_build(build.abort_handle());

        if let Some(after) = cfg.timeout() {
            let bus = shared.bus.clone();
            let client = owner.client();
            self.arm_timeout(shared.workers.runtime(), after, move |task| {
                bus.publish(
                    Event::unit(EventKind::TimeoutHit, client, task.pos()).with_timeout(after),
                );
            });
        }

        let task = Arc::clone(self);
        let owner = Arc::clone(owner);
        shared.workers.runtime().spawn(async move {
            // a running blocking build ignores abort; cancellation abandons it instead
            let outcome = tokio::select! {
                res = build => Outcome::from_join(res),
                _ = task.ctx.cancelled() => Outcome::Cancelled,
            };
            task.cancel_timeout();
            owner.complete(&task, permits, outcome);
        });
    }

    /// Requests cancellation. Returns `true` for the call that flipped the flag.
    pub fn cancel(&self) -> bool {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        self.cancel_timeout();
        self.ctx.cancel();
        if let Some(build) = self.build.get() {
            build.abort();
        }
        true
    }

    pub fn cancel_timeout(&self) {
        if let Some(timer) = self.timer.get() {
            timer.cancel();
        }
    }

    fn attach_build(&self, handle: AbortHandle) {
        let _ = self.build.set(handle);
        // cancel() may have run before the handle was visible
        if self.is_cancelled() {
            if let Some(build) = self.build.get() {
                build.abort();
            }
        }
    }

    /// Schedules a cancellation after `after`; `on_fire` runs only if the timer won.
    fn arm_timeout<F>(self: &Arc<Self>, runtime: &Handle, after: Duration, on_fire: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        let timer = CancellationToken::new();
        if self.timer.set(timer.clone()).is_err() {
            return;
        }
        if self.is_cancelled() {
            timer.cancel();
            return;
        }

        let task = Arc::downgrade(self);
        runtime.spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = time::sleep(after) => {
                    if let Some(task) = task.upgrade() {
                        if task.cancel() {
                            on_fire(&task);
                        }
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;

    impl Connection for Null {
        type World = ();
        type Payload = ();

        fn is_live(&self) -> bool {
            true
        }
        fn send_built(&self, _: &(), _: UnitPos, _: ()) {}
        fn send_sync(&self, _: &(), _: UnitPos) {}
    }

    fn task() -> Arc<DispatchTask<Null>> {
        DispatchTask::new(UnitPos::new(1, 1), Arc::new(Null), Arc::new(()))
    }

    #[test]
    fn cancel_flips_once() {
        let t = task();
        assert!(!t.is_cancelled());
        assert!(t.cancel());
        assert!(!t.cancel());
        assert!(t.is_cancelled());
        assert!(t.ctx.is_cancelled());
    }

    #[test]
    fn finish_is_exactly_once() {
        let t = task();
        assert_eq!(t.state(), TaskState::Created);
        assert!(t.finish(TaskState::Failed));
        assert!(!t.finish(TaskState::Completed));
        assert_eq!(t.state(), TaskState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_running_task() {
        let t = task();
        let (tx, rx) = tokio::sync::oneshot::channel();
        t.arm_timeout(&Handle::current(), Duration::from_millis(50), move |_| {
            let _ = tx.send(());
        });

        rx.await.expect("timer fired");
        assert!(t.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timeout_never_fires() {
        let t = task();
        let (tx, mut rx) = tokio::sync::oneshot::channel::<()>();
        t.arm_timeout(&Handle::current(), Duration::from_millis(50), move |_| {
            let _ = tx.send(());
        });
        t.cancel_timeout();

        time::sleep(Duration::from_millis(200)).await;
        assert!(!t.is_cancelled());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_arming_skips_timer() {
        let t = task();
        t.cancel();
        t.arm_timeout(&Handle::current(), Duration::from_millis(10), |_| {
            panic!("timer must not fire after cancel");
        });
        time::sleep(Duration::from_millis(50)).await;
    }
}
