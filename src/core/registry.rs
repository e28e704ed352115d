//! # Per-client task registry.
//!
//! [`ClientTasks`] deduplicates in-flight units of one client and applies the
//! two-level admission gate before a build is launched.
//!
//! ## Admission
//! ```text
//! enqueue(pos)
//!   ├─► key in tasks?             → true   (already in flight)
//!   ├─► client slot free?  no     → false  (per-client backpressure)
//!   ├─► global slot free?  no     → false  (client slot released)
//!   ├─► insert-if-absent lost     → true   (both slots released, other submit owns it)
//!   └─► task.start(permits)       → true
//! ```
//!
//! ## Rules
//! - A key is present iff its task holds both slots and has not completed.
//! - Slots travel with the task as [`Permits`] and are dropped exactly once.
//! - Removal is by key **and** identity; a newer task under the same key is never removed.
//! - Never blocks: DashMap shard locks are held only for the map operation itself.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::core::connection::Connection;
use crate::core::dispatcher::Shared;
use crate::core::limiter::{SlotLimiter, SlotPermit};
use crate::core::task::{DispatchTask, TaskState};
use crate::events::{Event, EventKind};
use crate::unit::{ClientId, UnitKey, UnitPos};

/// Client and global slot of one admitted task.
///
/// Dropping it releases the client slot, then the global slot.
#[derive(Debug)]
pub(crate) struct Permits {
    _client: SlotPermit,
    _global: SlotPermit,
}

/// In-flight units of one client.
pub(crate) struct ClientTasks<C: Connection> {
    client: ClientId,
    limiter: Arc<SlotLimiter>,
    pub(super) tasks: DashMap<UnitKey, Arc<DispatchTask<C>>>,
    shared: Arc<Shared<C>>,
}

impl<C: Connection> ClientTasks<C> {
    pub fn new(client: ClientId, shared: Arc<Shared<C>>) -> Arc<Self> {
        Arc::new(Self {
            client,
            limiter: SlotLimiter::new(),
            tasks: DashMap::new(),
            shared,
        })
    }

    #[inline]
    pub fn client(&self) -> ClientId {
        self.client
    }

    #[inline]
    pub fn shared(&self) -> &Arc<Shared<C>> {
        &self.shared
    }

    /// Number of client slots currently reserved.
    pub fn in_flight(&self) -> usize {
        self.limiter.in_flight()
    }

    pub fn contains(&self, key: UnitKey) -> bool {
        self.tasks.contains_key(&key)
    }

    pub fn state(&self, key: UnitKey) -> Option<TaskState> {
        self.tasks.get(&key).map(|t| t.state())
    }

    /// Admits `pos` and starts its build.
    ///
    /// Returns `false` only on backpressure.
    pub fn enqueue(self: &Arc<Self>, conn: Arc<C>, world: Arc<C::World>, pos: UnitPos) -> bool {
        let key = pos.key();
        if self.tasks.contains_key(&key) {
            self.publish(EventKind::AlreadyInFlight, pos);
            return true;
        }

        let cfg = self.shared.config();
        let Some(client) = self.limiter.try_acquire(cfg.client_limit()) else {
            self.publish(EventKind::RejectedClient, pos);
            return false;
        };
        let Some(global) = self.shared.global.try_acquire(cfg.global_limit()) else {
            drop(client);
            self.publish(EventKind::RejectedGlobal, pos);
            return false;
        };
        let permits = Permits {
            _client: client,
            _global: global,
        };

        let task = DispatchTask::new(pos, conn, world);
        match self.tasks.entry(key) {
            Entry::Occupied(_) => {
                drop(permits);
                self.publish(EventKind::AlreadyInFlight, pos);
                return true;
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&task));
            }
        }

        self.publish(EventKind::Admitted, pos);
        task.start(self, permits);
        true
    }

    /// Requests cancellation of the task for `key`, if any.
    pub fn cancel(&self, key: UnitKey) {
        let task = self.tasks.get(&key).map(|t| Arc::clone(t.value()));
        if let Some(task) = task {
            if task.cancel() {
                self.publish(EventKind::CancelRequested, task.pos());
            }
        }
    }

    /// Cancels every tracked task, then forgets them all.
    pub fn destroy(&self) {
        let tasks: Vec<Arc<DispatchTask<C>>> =
            self.tasks.iter().map(|t| Arc::clone(t.value())).collect();

        for task in &tasks {
            if task.cancel() {
                self.publish(EventKind::CancelRequested, task.pos());
            }
        }
        self.tasks.clear();
    }

    pub(super) fn publish(&self, kind: EventKind, pos: UnitPos) {
        self.shared.bus.publish(Event::unit(kind, self.client, pos));
    }
}
