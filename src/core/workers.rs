//! # Payload builds and the pools that run them.
//!
//! [`Prepare`] is the pure build routine (world + coordinates → payload).
//! [`PrepareFn`] adapts a closure into a [`Prepare`]. `Workers` launches a build on
//! the pool selected by [`ExecutorKind`]:
//!
//! ```text
//! launch(kind, ctx, ...)
//!   ├─ closed?            → Err(Rejected)          (synchronous fault)
//!   ├─ Cpu         → runtime.spawn_blocking(job)
//!   └─ Lightweight → runtime.spawn(async { job() })
//!
//! job:
//!   ctx cancelled? → Err(Canceled)   (never starts)
//!   else           → prepare(&ctx, conn, world, pos)
//! ```
//!
//! `Lightweight` runs the synchronous build on a runtime worker thread, so it is only
//! suitable for builds that never block. Anything heavier belongs on `Cpu`.
//!
//! Cancellation is advisory: the build receives `ctx` and should check it, and the
//! returned handle may be aborted, which only stops a job that has not begun.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorKind;
use crate::core::connection::Connection;
use crate::error::PrepareError;
use crate::unit::UnitPos;

/// Builds the payload for one unit.
///
/// Runs on a worker, never on the authoritative thread. Implementations must not
/// mutate the connection or the world.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use sendvisor::{Connection, Prepare, PrepareError, UnitPos};
///
/// struct Tcp;
/// impl Connection for Tcp {
///     type World = Vec<u8>;
///     type Payload = Vec<u8>;
///     fn is_live(&self) -> bool { true }
///     fn send_built(&self, _: &Vec<u8>, _: UnitPos, _: Vec<u8>) {}
///     fn send_sync(&self, _: &Vec<u8>, _: UnitPos) {}
/// }
///
/// struct Echo;
/// impl Prepare<Tcp> for Echo {
///     fn prepare(
///         &self,
///         ctx: &CancellationToken,
///         _conn: &Tcp,
///         world: &Vec<u8>,
///         _pos: UnitPos,
///     ) -> Result<Vec<u8>, PrepareError> {
///         if ctx.is_cancelled() {
///             return Err(PrepareError::Canceled);
///         }
///         Ok(world.clone())
///     }
/// }
/// ```
pub trait Prepare<C: Connection>: Send + Sync + 'static {
    /// Builds the payload for `pos`.
    ///
    /// Return [`PrepareError::Canceled`] when `ctx` is observed cancelled.
    fn prepare(
        &self,
        ctx: &CancellationToken,
        conn: &C,
        world: &C::World,
        pos: UnitPos,
    ) -> Result<C::Payload, PrepareError>;

    /// Stable name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Closure-backed [`Prepare`].
pub struct PrepareFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> PrepareFn<F> {
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> fmt::Debug for PrepareFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrepareFn").field("name", &self.name).finish()
    }
}

impl<C, F> Prepare<C> for PrepareFn<F>
where
    C: Connection,
    F: Fn(&CancellationToken, &C, &C::World, UnitPos) -> Result<C::Payload, PrepareError>
        + Send
        + Sync
        + 'static,
{
    fn prepare(
        &self,
        ctx: &CancellationToken,
        conn: &C,
        world: &C::World,
        pos: UnitPos,
    ) -> Result<C::Payload, PrepareError> {
        (self.f)(ctx, conn, world, pos)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Join handle of one launched build.
pub(crate) type BuildHandle<P> = JoinHandle<Result<P, PrepareError>>;

/// Launches builds onto the configured pool.
pub(crate) struct Workers<C: Connection> {
    runtime: Handle,
    prepare: Arc<dyn Prepare<C>>,
    closed: CancellationToken,
}

impl<C: Connection> Workers<C> {
    pub fn new(runtime: Handle, prepare: Arc<dyn Prepare<C>>, closed: CancellationToken) -> Self {
        Self {
            runtime,
            prepare,
            closed,
        }
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn prepare_name(&self) -> &str {
        self.prepare.name()
    }

    /// Starts one build. Fails synchronously once the pools are closed.
    pub fn launch(
        &self,
        kind: ExecutorKind,
        ctx: CancellationToken,
        conn: Arc<C>,
        world: Arc<C::World>,
        pos: UnitPos,
    ) -> Result<BuildHandle<C::Payload>, PrepareError> {
        if self.closed.is_cancelled() {
            return Err(PrepareError::Rejected);
        }

        let prepare = Arc::clone(&self.prepare);
        let job = move || {
            if ctx.is_cancelled() {
                return Err(PrepareError::Canceled);
            }
            prepare.prepare(&ctx, &conn, &world, pos)
        };

        Ok(match kind {
            ExecutorKind::Cpu => self.runtime.spawn_blocking(job),
            ExecutorKind::Lightweight => self.runtime.spawn(async move { job() }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;

    impl Connection for Null {
        type World = i32;
        type Payload = i64;

        fn is_live(&self) -> bool {
            true
        }
        fn send_built(&self, _: &i32, _: UnitPos, _: i64) {}
        fn send_sync(&self, _: &i32, _: UnitPos) {}
    }

    fn workers(closed: CancellationToken) -> Workers<Null> {
        let prepare: Arc<dyn Prepare<Null>> = Arc::new(PrepareFn::new(
            "sum",
            |_: &CancellationToken, _: &Null, world: &i32, pos: UnitPos| {
                Ok::<_, PrepareError>(i64::from(*world) + i64::from(pos.x) + i64::from(pos.z))
            },
        ));
        Workers::new(Handle::current(), prepare, closed)
    }

    #[tokio::test]
    async fn runs_on_both_pools() {
        let w = workers(CancellationToken::new());
        assert_eq!(w.prepare_name(), "sum");

        for kind in [ExecutorKind::Cpu, ExecutorKind::Lightweight] {
            let handle = w
                .launch(
                    kind,
                    CancellationToken::new(),
                    Arc::new(Null),
                    Arc::new(10),
                    UnitPos::new(1, 2),
                )
                .expect("launch");
            assert_eq!(handle.await.expect("join"), Ok(13));
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_never_builds() {
        let w = workers(CancellationToken::new());
        let ctx = CancellationToken::new();
        ctx.cancel();

        let handle = w
            .launch(ExecutorKind::Cpu, ctx, Arc::new(Null), Arc::new(0), UnitPos::new(0, 0))
            .expect("launch");
        assert_eq!(handle.await.expect("join"), Err(PrepareError::Canceled));
    }

    #[tokio::test]
    async fn closed_pools_reject_synchronously() {
        let closed = CancellationToken::new();
        let w = workers(closed.clone());
        closed.cancel();

        let res = w.launch(
            ExecutorKind::Lightweight,
            CancellationToken::new(),
            Arc::new(Null),
            Arc::new(0),
            UnitPos::new(0, 0),
        );
        assert!(matches!(res, Err(PrepareError::Rejected)));
    }
}
