pub mod error;
pub mod frequency;
pub mod ipc;
pub mod job;
pub mod schedule;
pub mod scheduler;
pub mod stats;
pub mod target;

pub use error::{Result, ScheduleError};
pub use frequency::Preview;
pub use ipc::{Request, Response};
pub use job::{Frequency, FrequencyId, Job, JobId, JobStatus, TargetType};
pub use schedule::{list_timezones, next_fire_time, parse_timezone, CronMask};
pub use scheduler::JobScheduler;
pub use stats::RunStats;
pub use target::{CronTarget, TargetRegistry};

// Production paths (follow FHS - Filesystem Hierarchy Standard)
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/cronmgr/cronmgr.sock";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cronmgr/config.yaml";

// Fallback socket for non-root users
pub const USER_SOCKET_PATH: &str = "/tmp/cronmgr.sock";

pub const DEFAULT_TIMEZONE: &str = "UTC";
