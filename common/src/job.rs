use crate::stats::RunStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FrequencyId(pub String);

impl FrequencyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for FrequencyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FrequencyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named cron mask that jobs refer to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frequency {
    pub id: FrequencyId,
    pub name: String,
    pub mask: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Url,
    Class,
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetType::Url => write!(f, "url"),
            TargetType::Class => write!(f, "class"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Inactive,
    Scheduled,
    Running,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Inactive => "inactive",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(JobStatus::Inactive),
            "scheduled" => Ok(JobStatus::Scheduled),
            "running" => Ok(JobStatus::Running),
            other => Err(format!("unknown job status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub frequency: FrequencyId,
    pub timezone: String,
    pub target_type: TargetType,
    pub target: String,
    /// Seconds a run may take before it is presumed hung.
    #[serde(default)]
    pub timeout: u64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub last_run_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stats: RunStats,
    /// Outcomes that trigger a notification. Carried for the notifier, not read here.
    #[serde(default)]
    pub notify_on: Vec<String>,
    #[serde(default)]
    pub notify_emails: Vec<String>,
}

impl Job {
    /// Builds a disabled job. Use `JobScheduler::set_enabled` to arm it.
    pub fn new(
        name: &str,
        frequency: &FrequencyId,
        timezone: &str,
        target_type: TargetType,
        target: &str,
    ) -> Self {
        Self {
            id: JobId::new(),
            name: name.trim().to_string(),
            description: String::new(),
            frequency: frequency.clone(),
            timezone: timezone.to_string(),
            target_type,
            target: target.trim().to_string(),
            timeout: 0,
            enabled: false,
            status: JobStatus::Inactive,
            last_run_date: None,
            next_run_date: None,
            stats: RunStats::default(),
            notify_on: Vec::new(),
            notify_emails: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_target(&mut self, target_type: TargetType, target: &str) {
        self.target_type = target_type;
        self.target = target.trim().to_string();
    }

    pub fn is_inactive(&self) -> bool {
        self.status == JobStatus::Inactive
    }

    pub fn is_scheduled(&self) -> bool {
        self.status == JobStatus::Scheduled
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }
}
