//! # Runtime events emitted by the dispatcher.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Admission events**: what `submit` decided (admitted, deduplicated, rejected)
//! - **Lifecycle events**: how a build ended (delivered, failed, cancelled, timed out)
//! - **Fallback events**: synchronous resend scheduled / performed
//! - **Subscriber events**: overflow and panic isolation
//!
//! The [`Event`] struct carries metadata such as timestamps, client, unit and reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Completions of different units are unordered; `seq` only orders publication.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use sendvisor::{ClientId, Event, EventKind, UnitPos};
//!
//! let client = ClientId::random();
//! let ev = Event::new(EventKind::PreparationFailed)
//!     .with_client(client)
//!     .with_unit(UnitPos::new(3, 4))
//!     .with_reason("boom")
//!     .with_timeout(Duration::from_millis(50));
//!
//! assert_eq!(ev.kind, EventKind::PreparationFailed);
//! assert_eq!(ev.client, Some(client));
//! assert_eq!(ev.reason.as_deref(), Some("boom"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::unit::{ClientId, UnitPos};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission events ===
    /// Unit admitted; both slots reserved and the build launched.
    ///
    /// Sets: `client`, `unit`
    Admitted,

    /// Unit already in flight for this client; nothing new started.
    ///
    /// Sets: `client`, `unit`
    AlreadyInFlight,

    /// Per-client limit reached.
    ///
    /// Sets: `client`, `unit`
    RejectedClient,

    /// Global limit reached.
    ///
    /// Sets: `client`, `unit`
    RejectedGlobal,

    // === Lifecycle events ===
    /// Cancellation requested by the caller (unit invalidated or client removed).
    ///
    /// Sets: `client`, `unit`
    CancelRequested,

    /// Build exceeded `preparation_timeout` and was cancelled.
    ///
    /// Sets: `client`, `unit`, `timeout_ms`
    TimeoutHit,

    /// Build finished but the task was cancelled; nothing delivered.
    ///
    /// Published after both slots are released.
    ///
    /// Sets: `client`, `unit`
    Cancelled,

    /// Build failed (error, panic or rejected launch).
    ///
    /// Sets: `client`, `unit`, `reason`
    PreparationFailed,

    /// Prepared payload handed to the connection.
    ///
    /// Sets: `client`, `unit`
    Delivered,

    // === Fallback events ===
    /// Synchronous resend queued on the authoritative thread.
    ///
    /// Sets: `client`, `unit`
    FallbackScheduled,

    /// Synchronous resend performed.
    ///
    /// Sets: `client`, `unit`
    FallbackDelivered,

    /// Client forgotten; every in-flight unit cancelled.
    ///
    /// Sets: `client`
    ClientRemoved,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason` (subscriber name and panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason` (subscriber name and cause)
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Client the event is about, if any.
    pub client: Option<ClientId>,
    /// Unit the event is about, if any.
    pub unit: Option<UnitPos>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Preparation timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            client: None,
            unit: None,
            reason: None,
            timeout_ms: None,
        }
    }

    /// Attaches a client id.
    #[inline]
    pub fn with_client(mut self, client: ClientId) -> Self {
        self.client = Some(client);
        self
    }

    /// Attaches unit coordinates.
    #[inline]
    pub fn with_unit(mut self, unit: UnitPos) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// Shorthand for an event about one unit of one client.
    #[inline]
    pub(crate) fn unit(kind: EventKind, client: ClientId, unit: UnitPos) -> Self {
        Event::new(kind).with_client(client).with_unit(unit)
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }
}
