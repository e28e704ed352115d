//! # Event subscribers for the dispatcher.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`] fan-out
//! used to deliver runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   ClientTasks ── publish(Event) ──► Bus ──► subscriber listener ──► SubscriberSet
//!                                                                       │
//!                                                          ┌────────────┼──────────┐
//!                                                          ▼            ▼          ▼
//!                                                      LogWriter     Metrics    Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use sendvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if matches!(event.kind, EventKind::PreparationFailed) {
//!             // increment failure counter
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
