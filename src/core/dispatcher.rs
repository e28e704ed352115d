//! # Dispatcher: process-wide entry point.
//!
//! The [`Dispatcher`] owns the client → [`ClientTasks`] map, the global
//! [`SlotLimiter`], the live configuration and the event bus. Callers on the
//! authoritative thread use three operations:
//!
//! ```text
//! submit(client, conn, world, pos) ─► gates (enabled, live, open)
//!                                     └─► clients[client].enqueue(...)   → bool
//! cancel(client, pos)              ─► clients[client].cancel(key)        (best effort)
//! remove_client(client)            ─► clients.remove(client).destroy()   (on disconnect)
//! ```
//!
//! None of them block or return errors; failures are contained and reported
//! through `tracing` and the event bus.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use tokio_util::sync::CancellationToken;
//! use sendvisor::{
//!     ClientId, Connection, DispatchConfig, Dispatcher, PrepareError, PrepareFn, TickQueue,
//!     UnitPos,
//! };
//!
//! struct Session { open: AtomicBool }
//!
//! impl Connection for Session {
//!     type World = String;
//!     type Payload = Vec<u8>;
//!     fn is_live(&self) -> bool { self.open.load(Ordering::Acquire) }
//!     fn send_built(&self, _world: &String, _pos: UnitPos, _payload: Vec<u8>) {}
//!     fn send_sync(&self, _world: &String, _pos: UnitPos) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = DispatchConfig { enabled: true, ..DispatchConfig::default() };
//!     let (queue, mut drain) = TickQueue::new();
//!
//!     let build = PrepareFn::new(
//!         "bytes",
//!         |_ctx: &CancellationToken, _conn: &Session, world: &String, _pos: UnitPos| {
//!             Ok::<_, PrepareError>(world.as_bytes().to_vec())
//!         },
//!     );
//!     let dispatcher = Dispatcher::builder(cfg).build(build, Arc::new(queue))?;
//!
//!     let conn = Arc::new(Session { open: AtomicBool::new(true) });
//!     let world = Arc::new("terrain".to_string());
//!     assert!(dispatcher.submit(ClientId::random(), conn, world, UnitPos::new(3, 4)));
//!
//!     // once per tick on the authoritative thread
//!     drain.run_pending();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::config::DispatchConfig;
use crate::core::builder::DispatcherBuilder;
use crate::core::connection::Connection;
use crate::core::limiter::SlotLimiter;
use crate::core::main_thread::MainThread;
use crate::core::registry::ClientTasks;
use crate::core::task::TaskState;
use crate::core::workers::Workers;
use crate::events::{Bus, Event, EventKind};
use crate::unit::{ClientId, UnitPos};

/// State shared by the dispatcher, every [`ClientTasks`] and every in-flight task.
pub(crate) struct Shared<C: Connection> {
    pub config: watch::Receiver<DispatchConfig>,
    pub global: Arc<SlotLimiter>,
    pub workers: Workers<C>,
    pub main_thread: Arc<dyn MainThread>,
    pub bus: Bus,
}

impl<C: Connection> Shared<C> {
    /// Snapshot of the live configuration.
    pub fn config(&self) -> DispatchConfig {
        self.config.borrow().clone()
    }
}

/// Asynchronous per-client payload dispatcher.
pub struct Dispatcher<C: Connection> {
    shared: Arc<Shared<C>>,
    config: watch::Sender<DispatchConfig>,
    clients: DashMap<ClientId, Arc<ClientTasks<C>>>,
    runtime_token: CancellationToken,
}

impl<C: Connection> Dispatcher<C> {
    /// Starts building a dispatcher with the given configuration.
    pub fn builder(cfg: DispatchConfig) -> DispatcherBuilder<C> {
        DispatcherBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        shared: Arc<Shared<C>>,
        config: watch::Sender<DispatchConfig>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            shared,
            config,
            clients: DashMap::new(),
            runtime_token,
        }
    }

    /// Submits `pos` for asynchronous preparation and delivery to `client`.
    ///
    /// Returns `true` if the unit was admitted or is already in flight, `false`
    /// if the caller should use its synchronous path (disabled, dead connection,
    /// shut down, or backpressure).
    pub fn submit(
        &self,
        client: ClientId,
        conn: Arc<C>,
        world: Arc<C::World>,
        pos: UnitPos,
    ) -> bool {
        if !self.shared.config.borrow().enabled {
            return false;
        }
        if self.runtime_token.is_cancelled() || !conn.is_live() {
            return false;
        }

        let tasks = self
            .clients
            .entry(client)
            .or_insert_with(|| ClientTasks::new(client, Arc::clone(&self.shared)))
            .clone();
        tasks.enqueue(conn, world, pos)
    }

    /// Best-effort cancel of one in-flight unit.
    ///
    /// No-op unless `enabled` and `cancel_on_unit_invalidated` are set.
    pub fn cancel(&self, client: ClientId, pos: UnitPos) {
        {
            let cfg = self.shared.config.borrow();
            if !cfg.enabled || !cfg.cancel_on_unit_invalidated {
                return;
            }
        }

        let tasks = self.clients.get(&client).map(|t| Arc::clone(t.value()));
        if let Some(tasks) = tasks {
            tasks.cancel(pos.key());
        }
    }

    /// Cancels and forgets every in-flight unit of `client`. Call on disconnect.
    pub fn remove_client(&self, client: ClientId) {
        if let Some((_, tasks)) = self.clients.remove(&client) {
            tasks.destroy();
            self.shared
                .bus
                .publish(Event::new(EventKind::ClientRemoved).with_client(client));
        }
    }

    /// Stops accepting work and cancels everything in flight. Idempotent.
    ///
    /// Builds launched after this point fail with
    /// [`PrepareError::Rejected`](crate::PrepareError::Rejected).
    pub fn shutdown(&self) {
        self.runtime_token.cancel();

        let clients: Vec<ClientId> = self.clients.iter().map(|c| *c.key()).collect();
        for client in clients {
            self.remove_client(client);
        }
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_shut_down(&self) -> bool {
        self.runtime_token.is_cancelled()
    }

    /// Publishes a new configuration; later decisions read it.
    pub fn reconfigure(&self, cfg: DispatchConfig) {
        self.config.send_replace(cfg);
    }

    /// Snapshot of the live configuration.
    pub fn config(&self) -> DispatchConfig {
        self.shared.config()
    }

    /// Receiver for runtime events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.shared.bus.subscribe()
    }

    /// Global slots currently reserved.
    pub fn global_in_flight(&self) -> usize {
        self.shared.global.in_flight()
    }

    /// Slots currently reserved by `client` (0 if unknown).
    pub fn in_flight(&self, client: ClientId) -> usize {
        self.clients
            .get(&client)
            .map(|t| t.in_flight())
            .unwrap_or(0)
    }

    /// Whether `pos` is currently tracked for `client`.
    pub fn is_in_flight(&self, client: ClientId, pos: UnitPos) -> bool {
        self.clients
            .get(&client)
            .map(|t| t.contains(pos.key()))
            .unwrap_or(false)
    }

    /// Lifecycle state of the tracked task for `pos`, if any.
    ///
    /// Completed tasks are forgotten, so this is `None` once the unit has left flight.
    pub fn task_state(&self, client: ClientId, pos: UnitPos) -> Option<TaskState> {
        self.clients.get(&client).and_then(|t| t.state(pos.key()))
    }

    /// Number of clients with a registry.
    pub fn clients(&self) -> usize {
        self.clients.len()
    }
}

impl<C: Connection> Drop for Dispatcher<C> {
    fn drop(&mut self) {
        self.runtime_token.cancel();
    }
}
