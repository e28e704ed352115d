//! Dispatch core: admission, task lifecycle and completion.
//!
//! The public API from this module is [`Dispatcher`] (plus its builder) and the
//! collaborator traits it consumes ([`Connection`], [`Prepare`], [`MainThread`]).
//!
//! Internal modules:
//! - [`limiter`]: non-blocking bounded slot counter with RAII permits;
//! - [`registry`]: per-client deduplication and two-level admission;
//! - [`task`]: one in-flight build, its cancellation and timeout;
//! - [`completion`]: release, delivery and fallback once a build ends;
//! - [`workers`]: launches builds on the CPU or lightweight pool;
//! - [`main_thread`]: the authoritative-thread rendezvous queue;
//! - [`dispatcher`]: process-wide entry points.

mod builder;
mod completion;
mod connection;
mod dispatcher;
mod limiter;
mod main_thread;
mod registry;
mod task;
mod workers;

pub(crate) use completion::panic_message;
pub use builder::DispatcherBuilder;
pub use connection::Connection;
pub use dispatcher::Dispatcher;
pub use limiter::{SlotLimiter, SlotPermit};
pub use main_thread::{Job, MainThread, TickDrain, TickQueue};
pub use task::TaskState;
pub use workers::{Prepare, PrepareFn};
