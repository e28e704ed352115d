//! # LogWriter: event printer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Admission traffic goes to `debug`, lifecycle to `info`, failures to `warn`.
//!
//! ## Example output
//! ```text
//! DEBUG sendvisor: [admitted] client=Some(..) unit=Some([3, 4])
//!  WARN sendvisor: [failed] client=Some(..) unit=Some([3, 4]) err=Some("error: io")
//!  INFO sendvisor: [fallback-scheduled] client=Some(..) unit=Some([3, 4])
//!  INFO sendvisor: [timeout] client=Some(..) unit=Some([5, 6]) timeout_ms=Some(50)
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let (client, unit) = (e.client, e.unit);
        match e.kind {
            EventKind::Admitted => {
                tracing::debug!("[admitted] client={client:?} unit={unit:?}");
            }
            EventKind::AlreadyInFlight => {
                tracing::debug!("[in-flight] client={client:?} unit={unit:?}");
            }
            EventKind::RejectedClient => {
                tracing::debug!("[rejected-client] client={client:?} unit={unit:?}");
            }
            EventKind::RejectedGlobal => {
                tracing::debug!("[rejected-global] client={client:?} unit={unit:?}");
            }
            EventKind::CancelRequested => {
                tracing::debug!("[cancel-requested] client={client:?} unit={unit:?}");
            }
            EventKind::TimeoutHit => {
                tracing::info!(
                    "[timeout] client={client:?} unit={unit:?} timeout_ms={:?}",
                    e.timeout_ms
                );
            }
            EventKind::Cancelled => {
                tracing::debug!("[cancelled] client={client:?} unit={unit:?}");
            }
            EventKind::PreparationFailed => {
                tracing::warn!(
                    "[failed] client={client:?} unit={unit:?} err={:?}",
                    e.reason
                );
            }
            EventKind::Delivered => {
                tracing::debug!("[delivered] client={client:?} unit={unit:?}");
            }
            EventKind::FallbackScheduled => {
                tracing::info!("[fallback-scheduled] client={client:?} unit={unit:?}");
            }
            EventKind::FallbackDelivered => {
                tracing::info!("[fallback-delivered] client={client:?} unit={unit:?}");
            }
            EventKind::ClientRemoved => {
                tracing::info!("[client-removed] client={client:?}");
            }
            EventKind::SubscriberOverflow => {
                tracing::warn!("[subscriber-overflow] {:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                tracing::warn!(
                    "[subscriber-panicked] {}",
                    e.reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
