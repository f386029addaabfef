//! Error types for mealshift-core.
//!
//! Construction-time validation lives in `ModelError`; anything that can go
//! wrong while orchestrating a day (storage, stale proposals) lives in
//! `KernelError`. The planner itself is total and has no error type.

use chrono::NaiveDate;
use thiserror::Error;

/// Rejections raised while building or mutating the data model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A macro gram value was negative, NaN or infinite.
    #[error("{field} must be a finite, non-negative number of grams (got {value})")]
    InvalidGrams { field: &'static str, value: f64 },

    /// A window's time bounds were empty or inverted.
    #[error("window '{id}' must start before it ends")]
    InvalidTimeBounds { id: String },

    /// A window was created without an identifier.
    #[error("window id must be non-empty")]
    EmptyWindowId,

    /// Two windows in the same day share an id.
    #[error("duplicate window id '{0}'")]
    DuplicateWindowId(String),

    /// An operation referenced a window that is not part of the day.
    #[error("unknown window '{0}'")]
    UnknownWindow(String),

    /// A meal was logged into a window that already closed without one.
    #[error("window '{0}' was missed and no longer accepts meals")]
    WindowClosed(String),

    /// A draft used a malformed local time or timezone.
    #[error("invalid time in draft: {0}")]
    InvalidTime(String),
}

/// Failure while driving a day plan through the kernel.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error(transparent)]
    Model(#[from] ModelError),

    /// No plan is stored for the requested day.
    #[error("no day plan stored for {0}")]
    PlanNotFound(NaiveDate),

    /// The plan changed after the proposal was computed.
    #[error("proposal for {day} was computed at revision {expected}, plan is now at {actual}")]
    StaleProposal {
        day: NaiveDate,
        expected: u64,
        actual: u64,
    },

    /// A preview result was handed back for commit.
    #[error("proposal for {0} is a preview and cannot be committed")]
    PreviewNotCommittable(NaiveDate),

    /// The backing store failed.
    #[error("day plan store failed: {message}")]
    Store {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl KernelError {
    /// Wrap a storage failure with a short description.
    pub fn store<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
