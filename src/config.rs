//! # Dispatcher configuration.
//!
//! Provides [`DispatchConfig`], the flat set of options consulted by the
//! dispatcher at admission and dispatch time.
//!
//! The dispatcher keeps the live copy in a `tokio::sync::watch` channel, so every
//! decision reads the **current** value:
//! 1. **Admission**: `enabled`, both in-flight limits
//! 2. **Start**: `executor`, `preparation_timeout`
//! 3. **Completion**: `deliver_on_main_thread`, `fallback_on_failure`
//! 4. **Cancel**: `cancel_on_unit_invalidated`
//!
//! Replace it at runtime with [`Dispatcher::reconfigure`](crate::Dispatcher::reconfigure).
//!
//! ## Sentinel values
//! - `max_in_flight_per_client <= 0` → unlimited (advisory counting only)
//! - `max_global_in_flight <= 0` → unlimited (advisory counting only)
//! - `preparation_timeout = 0s` → no timeout

use std::time::Duration;

/// Which worker pool runs payload builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    /// Bounded blocking pool (`spawn_blocking`). Suited for CPU-heavy serialization.
    #[default]
    Cpu,
    /// Regular runtime task. Only for builds that finish quickly without blocking.
    ///
    /// The build runs inline on a runtime worker thread; a slow build stalls the
    /// timers and completion callbacks scheduled on that worker.
    Lightweight,
}

impl ExecutorKind {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutorKind::Cpu => "cpu",
            ExecutorKind::Lightweight => "lightweight",
        }
    }
}

/// Configuration for the dispatcher.
///
/// ## Field semantics
/// - `enabled`: master switch; when off, `submit` always returns `false`
/// - `max_in_flight_per_client`: concurrent builds per client (`<= 0` = unlimited)
/// - `max_global_in_flight`: concurrent builds across all clients (`<= 0` = unlimited)
/// - `preparation_timeout`: builds still running after this are cancelled (`0s` = never)
/// - `cancel_on_unit_invalidated`: honour [`Dispatcher::cancel`](crate::Dispatcher::cancel)
/// - `deliver_on_main_thread`: marshal delivery onto the authoritative queue
/// - `fallback_on_failure`: resend synchronously when a build fails
/// - `executor`: which pool runs builds
/// - `bus_capacity`: event bus ring buffer size (min 1)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sprinkling sentinel
/// checks across the codebase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Enables asynchronous preparation and dispatch.
    pub enabled: bool,

    /// Maximum number of builds in flight for a single client.
    pub max_in_flight_per_client: i32,

    /// Hard upper bound of builds in flight across every client.
    pub max_global_in_flight: i32,

    /// Cancels a build that takes longer than this.
    ///
    /// - `Duration::ZERO` = no timeout
    pub preparation_timeout: Duration,

    /// When enabled, pending builds are cancelled once their unit is invalidated.
    pub cancel_on_unit_invalidated: bool,

    /// When true, prepared payloads are flushed on the authoritative thread.
    pub deliver_on_main_thread: bool,

    /// When a build fails, fall back to the synchronous send path.
    pub fallback_on_failure: bool,

    /// Worker pool used for builds.
    pub executor: ExecutorKind,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl DispatchConfig {
    /// Returns the per-client limit as an `Option` (`None` → unlimited).
    #[inline]
    pub fn client_limit(&self) -> Option<usize> {
        positive(self.max_in_flight_per_client)
    }

    /// Returns the global limit as an `Option` (`None` → unlimited).
    #[inline]
    pub fn global_limit(&self) -> Option<usize> {
        positive(self.max_global_in_flight)
    }

    /// Returns the preparation timeout as an `Option` (`None` → no timeout).
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        if self.preparation_timeout == Duration::ZERO {
            None
        } else {
            Some(self.preparation_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn positive(limit: i32) -> Option<usize> {
    usize::try_from(limit).ok().filter(|n| *n > 0)
}

impl Default for DispatchConfig {
    /// Default configuration:
    ///
    /// - `enabled = false` (opt-in)
    /// - `max_in_flight_per_client = 6`
    /// - `max_global_in_flight = 256`
    /// - `preparation_timeout = 0s` (no timeout)
    /// - `cancel_on_unit_invalidated = true`
    /// - `deliver_on_main_thread = false`
    /// - `fallback_on_failure = true`
    /// - `executor = ExecutorKind::Cpu`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            enabled: false,
            max_in_flight_per_client: 6,
            max_global_in_flight: 256,
            preparation_timeout: Duration::ZERO,
            cancel_on_unit_invalidated: true,
            deliver_on_main_thread: false,
            fallback_on_failure: true,
            executor: ExecutorKind::Cpu,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_limits_are_unlimited() {
        let mut cfg = DispatchConfig::default();
        assert_eq!(cfg.client_limit(), Some(6));
        assert_eq!(cfg.global_limit(), Some(256));

        cfg.max_in_flight_per_client = 0;
        cfg.max_global_in_flight = -5;
        assert_eq!(cfg.client_limit(), None);
        assert_eq!(cfg.global_limit(), None);
    }

    #[test]
    fn zero_timeout_is_none() {
        let mut cfg = DispatchConfig::default();
        assert_eq!(cfg.timeout(), None);

        cfg.preparation_timeout = Duration::from_millis(250);
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn bus_capacity_never_zero() {
        let cfg = DispatchConfig {
            bus_capacity: 0,
            ..DispatchConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
