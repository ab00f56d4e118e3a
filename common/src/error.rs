use thiserror::Error;

/// Errors raised by the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The cron mask could not be parsed or has out-of-range fields.
    #[error("Invalid cron job pattern '{mask}': {reason}")]
    InvalidMask { mask: String, reason: String },

    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),

    #[error("A frequency with this mask already exists: {0}")]
    DuplicateMask(String),

    #[error("This cron job already exists: {0}")]
    DuplicateName(String),

    /// A frequency cannot be removed while jobs still point at it.
    #[error("Frequency {frequency} is used by {jobs} job(s)")]
    FrequencyInUse { frequency: String, jobs: usize },

    #[error("Job {job} does not reference frequency {frequency}")]
    FrequencyMismatch { job: String, frequency: String },

    #[error("Job {0} is not due")]
    NotDue(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl ScheduleError {
    pub(crate) fn invalid_mask(mask: &str, reason: impl ToString) -> Self {
        ScheduleError::InvalidMask {
            mask: mask.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
