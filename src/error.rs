//! Error types used by the dispatcher and by payload preparation.
//!
//! This module defines three enums:
//!
//! - [`PrepareError`]: outcome of a failed (or self-cancelled) payload build.
//! - [`QueueError`]: the authoritative-thread queue refused a job.
//! - [`BuildError`]: the dispatcher could not be constructed.
//!
//! None of these ever escape [`Dispatcher::submit`](crate::Dispatcher::submit):
//! preparation failures are contained inside the engine and reported through
//! logs and [`Event`](crate::Event)s only.

use thiserror::Error;

/// # Errors produced by payload preparation.
///
/// Returned by [`Prepare::prepare`](crate::Prepare::prepare) or synthesized by
/// the engine when the build could not run to completion.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrepareError {
    /// The build ran and failed.
    #[error("preparation failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The build panicked on its worker.
    #[error("preparation panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The executor refused the job (dispatcher already shut down).
    #[error("executor rejected the preparation")]
    Rejected,

    /// The build observed its cancellation token and gave up.
    ///
    /// Never treated as a failure: no warning, no fallback.
    #[error("preparation cancelled")]
    Canceled,
}

impl PrepareError {
    /// Shorthand for [`PrepareError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        PrepareError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sendvisor::PrepareError;
    ///
    /// assert_eq!(PrepareError::Rejected.as_label(), "prepare_rejected");
    /// assert_eq!(PrepareError::fail("io").as_label(), "prepare_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            PrepareError::Fail { .. } => "prepare_failed",
            PrepareError::Panicked { .. } => "prepare_panicked",
            PrepareError::Rejected => "prepare_rejected",
            PrepareError::Canceled => "prepare_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            PrepareError::Fail { error } => format!("error: {error}"),
            PrepareError::Panicked { info } => format!("panic: {info}"),
            PrepareError::Rejected => "executor rejected job".to_string(),
            PrepareError::Canceled => "cancelled".to_string(),
        }
    }

    /// `true` for [`PrepareError::Canceled`], the only variant that is not a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PrepareError::Canceled)
    }
}

/// Error returned by [`TickQueue::try_execute`](crate::TickQueue::try_execute).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The draining side ([`TickDrain`](crate::TickDrain)) was dropped.
    #[error("authoritative queue closed")]
    Closed,
}

/// Error returned by [`DispatcherBuilder::build`](crate::DispatcherBuilder::build).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BuildError {
    /// No runtime handle was given and none is current on this thread.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::NoRuntime(_) => "build_no_runtime",
        }
    }
}
