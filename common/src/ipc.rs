use crate::frequency::Preview;
use crate::job::{Frequency, Job, TargetType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Requests understood by the daemon. Jobs travel with the request; the
/// daemon keeps no job state. A missing `now` means the daemon clock.
#[derive(Debug, Serialize, Deserialize)]
pub enum Request {
    ValidateMask {
        mask: String,
        #[serde(default)]
        existing: Vec<String>,
        timezone: Option<String>,
        now: Option<DateTime<Utc>>,
    },
    NextFireTimes {
        mask: String,
        timezone: Option<String>,
        after: Option<DateTime<Utc>>,
        count: usize,
    },
    SetEnabled {
        job: Job,
        frequency: Frequency,
        enabled: bool,
        now: Option<DateTime<Utc>>,
    },
    ShouldRunNow {
        job: Job,
        now: Option<DateTime<Utc>>,
    },
    MarkRunning {
        job: Job,
        now: Option<DateTime<Utc>>,
    },
    RunCompleted {
        job: Job,
        frequency: Frequency,
        success: bool,
        elapsed_seconds: f64,
        now: Option<DateTime<Utc>>,
    },
    FrequencyChanged {
        job: Job,
        frequency: Frequency,
        now: Option<DateTime<Utc>>,
    },
    ListTimezones,
    ValidateTarget {
        target_type: TargetType,
        target: String,
    },
    Metrics,
}

impl Request {
    /// Short operation name used in logs and metrics labels.
    pub fn operation(&self) -> &'static str {
        match self {
            Request::ValidateMask { .. } => "validate_mask",
            Request::NextFireTimes { .. } => "next_fire_times",
            Request::SetEnabled { .. } => "set_enabled",
            Request::ShouldRunNow { .. } => "should_run_now",
            Request::MarkRunning { .. } => "mark_running",
            Request::RunCompleted { .. } => "run_completed",
            Request::FrequencyChanged { .. } => "frequency_changed",
            Request::ListTimezones => "list_timezones",
            Request::ValidateTarget { .. } => "validate_target",
            Request::Metrics => "metrics",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Error(String),
    Preview(Preview),
    FireTimes(Vec<DateTime<Utc>>),
    Job(Job),
    /// The operation failed after changing the job; the caller must store `job`.
    JobError { job: Job, error: String },
    Due(bool),
    Timezones(Vec<String>),
    Metrics(String),
}
