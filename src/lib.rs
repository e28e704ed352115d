//! # sendvisor
//!
//! **Sendvisor** prepares and delivers per-unit payloads (e.g. world-data packets)
//! to many connected clients without blocking the single authoritative thread
//! that owns world state.
//!
//! Serialization runs on worker pools; admission is bounded per client and
//! globally; duplicate requests for the same unit are folded; stale units can be
//! cancelled or time out; and every touch of connection state goes back through
//! one authoritative-thread queue.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   authoritative thread
//!     │ submit / cancel / remove_client
//!     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Dispatcher (process-wide)                                        │
//! │  - clients: DashMap<ClientId, ClientTasks>                        │
//! │  - global SlotLimiter                                             │
//! │  - live DispatchConfig (watch channel)                            │
//! │  - Bus (broadcast events) ──► SubscriberSet                       │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌────────────┐     ┌────────────┐     ┌────────────┐
//!   │ClientTasks │     │ClientTasks │     │ClientTasks │  per client:
//!   │ limiter    │     │ limiter    │     │ limiter    │  dedup + admission
//!   │ tasks{key} │     │ tasks{key} │     │ tasks{key} │
//!   └─────┬──────┘     └─────┬──────┘     └─────┬──────┘
//!         ▼                  ▼                  ▼
//!   DispatchTask::start ─► Workers (Cpu: spawn_blocking | Lightweight: spawn)
//!         │                  + optional timeout timer
//!         ▼
//!   completion callback (worker thread)
//!         ├─ release client + global slot
//!         ├─ cancelled?  → drop silently
//!         ├─ failed?     → warn!, fallback ─► MainThread: send_sync
//!         └─ prepared    → deliver ─► inline or MainThread: send_built
//! ```
//!
//! ### Task lifecycle
//! ```text
//! Created ──start()──► Running ──┬──► Completed
//!                                ├──► Failed
//!                                └──► Cancelled   (cancel(), timeout, remove_client)
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                       |
//! |-------------------|-------------------------------------------------------------|------------------------------------------|
//! | **Dispatch**      | Submit, cancel, forget clients; live reconfiguration.       | [`Dispatcher`], [`DispatcherBuilder`]    |
//! | **Collaborators** | Transport, build routine and authoritative thread.          | [`Connection`], [`Prepare`], [`MainThread`] |
//! | **Admission**     | Reject-don't-wait bounded counters.                         | [`SlotLimiter`], [`SlotPermit`]          |
//! | **Events**        | Lifecycle events and subscriber fan-out.                    | [`Event`], [`Subscribe`]                 |
//! | **Errors**        | Typed errors for builds and construction.                   | [`PrepareError`], [`BuildError`]         |
//! | **Configuration** | Centralized options with sentinel helpers.                  | [`DispatchConfig`], [`ExecutorKind`]     |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] subscriber that renders events via `tracing`.
//!
//! See [`Dispatcher`] for an end-to-end example.

mod config;
mod core;
mod error;
mod events;
mod subscribers;
mod unit;

// ---- Public re-exports ----

pub use config::{DispatchConfig, ExecutorKind};
pub use core::{
    Connection, Dispatcher, DispatcherBuilder, Job, MainThread, Prepare, PrepareFn, SlotLimiter,
    SlotPermit, TaskState, TickDrain, TickQueue,
};
pub use error::{BuildError, PrepareError, QueueError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use unit::{ClientId, UnitKey, UnitPos};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
