//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the dispatcher.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ClientTasks` (admission, completion), `DispatchTask` (timeout),
//!   authoritative-thread jobs (delivery, fallback), `SubscriberSet` workers.
//! - **Consumers**: the dispatcher's subscriber listener (fans out to
//!   `SubscriberSet`) and any receiver from `Dispatcher::events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
