use crate::config::Config;
use crate::metrics::MetricsCollector;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use common::{frequency, CronMask, JobScheduler, Request, Response, ScheduleError, TargetRegistry};
use std::sync::Arc;

/// Maps wire requests onto the scheduling core.
///
/// The service is stateless with respect to jobs: every request carries the job
/// it is about and the updated job travels back in the response. Runners must
/// still serialize `ShouldRunNow` -> `MarkRunning` per job on their side.
pub struct SchedulerService {
    scheduler: JobScheduler,
    default_zone: Tz,
    max_fire_times: usize,
    targets: TargetRegistry,
    metrics: Arc<MetricsCollector>,
}

impl SchedulerService {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let default_zone = common::parse_timezone(&config.scheduling.default_timezone)?;

        let mut targets = TargetRegistry::new();
        for target in &config.targets {
            targets.register(Arc::new(target.clone()));
        }
        log::info!("Registered {} class target(s)", config.targets.len());

        let scheduler = JobScheduler::new(Duration::seconds(config.scheduling.min_lead_time_secs));
        log::info!("Minimum lead time is {}s", scheduler.min_lead_time().num_seconds());

        Ok(Self {
            scheduler,
            default_zone,
            max_fire_times: config.scheduling.max_fire_times,
            targets,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// `clock` is used wherever the request leaves `now` unset.
    pub fn handle(&self, request: Request, clock: DateTime<Utc>) -> Response {
        let operation = request.operation();
        self.metrics.record_request(operation);

        match self.dispatch(request, clock) {
            Ok(Response::JobError { job, error }) => {
                self.metrics.record_error(operation);
                log::warn!("{} failed for job {}: {}", operation, job.name, error);
                Response::JobError { job, error }
            }
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_error(operation);
                log::warn!("{} failed: {}", operation, e);
                Response::Error(e.to_string())
            }
        }
    }

    fn zone(&self, name: Option<&str>) -> Result<Tz, ScheduleError> {
        match name {
            Some(name) => common::parse_timezone(name),
            None => Ok(self.default_zone),
        }
    }

    fn dispatch(&self, request: Request, clock: DateTime<Utc>) -> Result<Response, ScheduleError> {
        let response = match request {
            Request::ValidateMask { mask, existing, timezone, now } => {
                let zone = self.zone(timezone.as_deref())?;
                let existing = existing.iter().map(String::as_str);
                let preview = frequency::check(&mask, existing, now.unwrap_or(clock), zone)?;
                Response::Preview(preview)
            }
            Request::NextFireTimes { mask, timezone, after, count } => {
                let zone = self.zone(timezone.as_deref())?;
                let mask = CronMask::parse(&mask)?;
                let count = count.min(self.max_fire_times);
                Response::FireTimes(mask.upcoming(after.unwrap_or(clock), count, zone))
            }
            Request::SetEnabled { mut job, frequency, enabled, now } => {
                self.scheduler.set_enabled(&mut job, &frequency, enabled, now.unwrap_or(clock))?;
                Response::Job(job)
            }
            Request::ShouldRunNow { job, now } => {
                let now = now.unwrap_or(clock);
                let due = self.scheduler.should_run_now(&job, now);
                if due {
                    self.metrics.record_due(&job.id.0);
                    if self.scheduler.is_hung(&job, now) {
                        log::warn!("Job {} presumed hung since {:?}", job.name, job.last_run_date);
                        self.metrics.record_hang_recovery(&job.id.0);
                    }
                }
                Response::Due(due)
            }
            Request::MarkRunning { mut job, now } => {
                self.scheduler.mark_running(&mut job, now.unwrap_or(clock))?;
                Response::Job(job)
            }
            Request::RunCompleted { mut job, frequency, success, elapsed_seconds, now } => {
                let duration_ms = (elapsed_seconds.max(0.0) * 1000.0) as u64;
                self.metrics.record_completion(&job.id.0, success, duration_ms);
                let now = now.unwrap_or(clock);
                // Stats are folded even when re-arming fails, so the job goes back either way
                let completed = self.scheduler.on_run_completed(
                    &mut job,
                    &frequency,
                    now,
                    success,
                    elapsed_seconds,
                );
                match completed {
                    Ok(()) => Response::Job(job),
                    Err(e) => Response::JobError { job, error: e.to_string() },
                }
            }
            Request::FrequencyChanged { mut job, frequency, now } => {
                self.scheduler.on_frequency_changed(&mut job, &frequency, now.unwrap_or(clock))?;
                Response::Job(job)
            }
            Request::ListTimezones => Response::Timezones(common::list_timezones()),
            Request::ValidateTarget { target_type, target } => {
                self.targets.validate_target(target_type, &target)?;
                Response::Ok
            }
            Request::Metrics => Response::Metrics(self.metrics.export()),
        };
        Ok(response)
    }
}
