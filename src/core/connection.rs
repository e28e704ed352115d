//! # Client connection abstraction.
//!
//! The dispatcher never owns transport. It talks to a client through
//! [`Connection`], which exposes liveness plus the two send paths:
//! - [`send_built`](Connection::send_built) flushes a payload prepared off-thread;
//! - [`send_sync`](Connection::send_sync) is the synchronous build-and-send path
//!   used as fallback when asynchronous preparation fails.
//!
//! The world type is whatever the build needs to read; the payload type is opaque
//! to the engine.

use crate::unit::UnitPos;

/// A connected client as seen by the dispatcher.
///
/// ### Threading
/// `send_built` runs on the authoritative thread when
/// `deliver_on_main_thread` is set, otherwise on whichever worker completed the
/// build. `send_sync` always runs on the authoritative thread.
pub trait Connection: Send + Sync + 'static {
    /// World state the build reads.
    type World: Send + Sync + 'static;

    /// Prepared payload handed back to [`send_built`](Connection::send_built).
    type Payload: Send + 'static;

    /// Whether the connection still accepts messages.
    fn is_live(&self) -> bool;

    /// Sends a payload built by [`Prepare`](crate::Prepare).
    fn send_built(&self, world: &Self::World, pos: UnitPos, payload: Self::Payload);

    /// Builds and sends `pos` synchronously.
    fn send_sync(&self, world: &Self::World, pos: UnitPos);
}
