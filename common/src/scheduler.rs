use crate::error::{Result, ScheduleError};
use crate::job::{Frequency, Job, JobStatus};
use crate::schedule::{parse_timezone, CronMask};
use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_MIN_LEAD_TIME_SECS: i64 = 60;

/// Drives the `inactive | scheduled | running` lifecycle of a job.
///
/// Every operation takes the current instant explicitly; nothing here reads a
/// clock or keeps state between calls. Callers are expected to serialize the
/// `should_run_now` -> `mark_running` pair per job (see the daemon docs).
#[derive(Debug, Clone, Copy)]
pub struct JobScheduler {
    min_lead_time: Duration,
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_MIN_LEAD_TIME_SECS))
    }
}

impl JobScheduler {
    pub fn new(min_lead_time: Duration) -> Self {
        Self { min_lead_time }
    }

    pub fn min_lead_time(&self) -> Duration {
        self.min_lead_time
    }

    /// First fire time that lies more than the minimum lead time after `now`.
    ///
    /// With the default one-minute lead this is either the next occurrence or,
    /// when that one is a minute away or less, the occurrence after it.
    pub fn next_run_date(
        &self,
        job: &Job,
        frequency: &Frequency,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        if job.frequency != frequency.id {
            return Err(ScheduleError::FrequencyMismatch {
                job: job.name.clone(),
                frequency: frequency.name.clone(),
            });
        }

        let zone = parse_timezone(&job.timezone)?;
        let mask = CronMask::parse(&frequency.mask)?;

        let first = mask.next_fire_time(now, 0, zone)?;
        if first - now > self.min_lead_time {
            return Ok(first);
        }

        log::debug!(
            "Job {}: next fire time {} is within the lead time, skipping ahead",
            job.name,
            first
        );
        let found = mask.after(now, zone).find(|candidate| *candidate - now > self.min_lead_time);
        found.ok_or_else(|| ScheduleError::InvalidMask {
            mask: frequency.mask.clone(),
            reason: "mask never fires again".to_string(),
        })
    }

    /// Enabling always re-arms the job from `now`. On error the job is left untouched.
    pub fn set_enabled(
        &self,
        job: &mut Job,
        frequency: &Frequency,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if enabled {
            let next = self.next_run_date(job, frequency, now)?;
            job.enabled = true;
            job.status = JobStatus::Scheduled;
            job.next_run_date = Some(next);
            log::info!("Job {} scheduled for {}", job.name, next);
        } else {
            job.enabled = false;
            job.status = JobStatus::Inactive;
            log::info!("Job {} disabled", job.name);
        }
        Ok(())
    }

    /// Whether the runner should dispatch `job` at `now`. Read-only.
    pub fn should_run_now(&self, job: &Job, now: DateTime<Utc>) -> bool {
        if !job.enabled {
            return false;
        }

        match job.status {
            JobStatus::Inactive => false,
            JobStatus::Running => self.is_hung(job, now),
            JobStatus::Scheduled => job.next_run_date.map_or(false, |next| now > next),
        }
    }

    /// A running job is presumed hung once `timeout` seconds have passed since
    /// it was dispatched. A running job without a dispatch time counts as hung.
    pub fn is_hung(&self, job: &Job, now: DateTime<Utc>) -> bool {
        if job.status != JobStatus::Running {
            return false;
        }
        let Some(last_run) = job.last_run_date else {
            return true;
        };
        let timeout = Duration::seconds(job.timeout.min(u32::MAX as u64) as i64);
        match last_run.checked_add_signed(timeout) {
            Some(deadline) => now > deadline,
            None => false,
        }
    }

    /// The dispatch transition performed by the runner.
    pub fn mark_running(&self, job: &mut Job, now: DateTime<Utc>) -> Result<()> {
        if !self.should_run_now(job, now) {
            return Err(ScheduleError::NotDue(job.name.clone()));
        }
        if job.is_running() {
            log::warn!("Job {} exceeded its {}s timeout, dispatching again", job.name, job.timeout);
        }
        job.status = JobStatus::Running;
        job.last_run_date = Some(now);
        Ok(())
    }

    /// Folds the outcome into the job's stats and re-arms it.
    ///
    /// Stats are recorded even if re-arming fails; in that case the job is
    /// parked as scheduled without a next run date until its frequency is fixed.
    pub fn on_run_completed(
        &self,
        job: &mut Job,
        frequency: &Frequency,
        now: DateTime<Utc>,
        success: bool,
        elapsed_seconds: f64,
    ) -> Result<()> {
        job.stats = job.stats.fold(success, elapsed_seconds);
        log::info!(
            "Job {} finished (success: {}, {:.3}s)",
            job.name,
            success,
            elapsed_seconds
        );

        if !job.enabled {
            job.status = JobStatus::Inactive;
            return Ok(());
        }

        match self.next_run_date(job, frequency, now) {
            Ok(next) => {
                job.status = JobStatus::Scheduled;
                job.next_run_date = Some(next);
                Ok(())
            }
            Err(e) => {
                log::error!("Job {} could not be rescheduled: {}", job.name, e);
                job.status = JobStatus::Scheduled;
                job.next_run_date = None;
                Err(e)
            }
        }
    }

    /// Re-arms an enabled job after its frequency's mask was edited.
    /// Returns whether the job was affected.
    pub fn on_frequency_changed(
        &self,
        job: &mut Job,
        frequency: &Frequency,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if job.frequency != frequency.id || !job.enabled {
            return Ok(false);
        }
        let next = self.next_run_date(job, frequency, now)?;
        job.next_run_date = Some(next);
        log::info!("Job {} rescheduled for {} after frequency change", job.name, next);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FrequencyId, TargetType};
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
    }

    fn frequency(mask: &str) -> Frequency {
        Frequency {
            id: FrequencyId::new(),
            name: mask.to_string(),
            mask: mask.to_string(),
        }
    }

    fn job_for(frequency: &Frequency) -> Job {
        Job::new("ping", &frequency.id, "UTC", TargetType::Url, "https://example.com/ping")
            .with_timeout(30)
    }

    #[test]
    fn test_enable_keeps_distant_fire_time() {
        let scheduler = JobScheduler::default();
        let every_five = frequency("*/5 * * * *");
        let mut job = job_for(&every_five);

        scheduler.set_enabled(&mut job, &every_five, true, at(12, 0, 0)).unwrap();
        assert!(job.enabled);
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.next_run_date, Some(at(12, 5, 0)));
    }

    #[test]
    fn test_enable_skips_imminent_fire_time() {
        let scheduler = JobScheduler::default();
        let every_minute = frequency("* * * * *");
        let mut job = job_for(&every_minute);

        scheduler.set_enabled(&mut job, &every_minute, true, at(12, 4, 5)).unwrap();
        assert_eq!(job.next_run_date, Some(at(12, 6, 0)));
    }

    #[test]
    fn test_lead_time_always_exceeds_a_minute() {
        let scheduler = JobScheduler::default();
        for mask in ["* * * * *", "*/2 * * * *", "0 * * * *", "5 4 * * *"] {
            for zone in ["UTC", "Asia/Kathmandu", "America/St Johns"] {
                for now in [at(3, 59, 0), at(4, 4, 1), at(12, 59, 59), at(23, 59, 30)] {
                    let freq = frequency(mask);
                    let mut job = job_for(&freq);
                    job.timezone = zone.to_string();
                    scheduler.set_enabled(&mut job, &freq, true, now).unwrap();
                    let lead = job.next_run_date.unwrap() - now;
                    assert!(lead > Duration::seconds(60), "{} in {} at {}", mask, zone, now);
                }
            }
        }
    }

    #[test]
    fn test_custom_lead_time() {
        let scheduler = JobScheduler::new(Duration::minutes(5));
        assert_eq!(scheduler.min_lead_time(), Duration::minutes(5));
        let every_minute = frequency("* * * * *");
        let mut job = job_for(&every_minute);

        scheduler.set_enabled(&mut job, &every_minute, true, at(12, 4, 5)).unwrap();
        assert_eq!(job.next_run_date, Some(at(12, 10, 0)));
    }

    #[test]
    fn test_disable_keeps_next_run_date() {
        let scheduler = JobScheduler::default();
        let freq = frequency("*/5 * * * *");
        let mut job = job_for(&freq);
        scheduler.set_enabled(&mut job, &freq, true, at(12, 0, 0)).unwrap();

        scheduler.set_enabled(&mut job, &freq, false, at(12, 1, 0)).unwrap();
        assert_eq!(job.status, JobStatus::Inactive);
        assert_eq!(job.next_run_date, Some(at(12, 5, 0)));
        assert!(!scheduler.should_run_now(&job, at(13, 0, 0)));
    }

    #[test]
    fn test_disabled_job_is_never_due() {
        let scheduler = JobScheduler::default();
        let freq = frequency("* * * * *");
        let mut job = job_for(&freq);
        job.next_run_date = Some(at(0, 0, 0));
        job.last_run_date = Some(at(0, 0, 0));

        for status in [JobStatus::Inactive, JobStatus::Scheduled, JobStatus::Running] {
            job.status = status;
            assert!(!scheduler.should_run_now(&job, at(12, 0, 0)));
        }
    }

    #[test]
    fn test_due_uses_strict_inequality() {
        let scheduler = JobScheduler::default();
        let freq = frequency("*/5 * * * *");
        let mut job = job_for(&freq);
        scheduler.set_enabled(&mut job, &freq, true, at(12, 0, 0)).unwrap();

        assert!(!scheduler.should_run_now(&job, at(12, 4, 59)));
        assert!(!scheduler.should_run_now(&job, at(12, 5, 0)));
        assert!(scheduler.should_run_now(&job, at(12, 5, 1)));
    }

    #[test]
    fn test_scheduled_without_next_run_is_not_due() {
        let scheduler = JobScheduler::default();
        let freq = frequency("* * * * *");
        let mut job = job_for(&freq);
        job.enabled = true;
        job.status = JobStatus::Scheduled;
        assert!(!scheduler.should_run_now(&job, at(12, 0, 0)));
    }

    #[test]
    fn test_hung_job_recovery() {
        let scheduler = JobScheduler::default();
        let freq = frequency("*/5 * * * *");
        let mut job = job_for(&freq);
        scheduler.set_enabled(&mut job, &freq, true, at(11, 0, 0)).unwrap();
        scheduler.mark_running(&mut job, at(12, 0, 0)).unwrap();

        assert!(job.is_running());
        assert!(!scheduler.should_run_now(&job, at(12, 0, 29)));
        assert!(!scheduler.should_run_now(&job, at(12, 0, 30)));
        assert!(scheduler.should_run_now(&job, at(12, 0, 31)));

        scheduler.mark_running(&mut job, at(12, 0, 31)).unwrap();
        assert_eq!(job.last_run_date, Some(at(12, 0, 31)));
    }

    #[test]
    fn test_running_without_dispatch_time_is_hung() {
        let scheduler = JobScheduler::default();
        let freq = frequency("* * * * *");
        let mut job = job_for(&freq);
        job.enabled = true;
        job.status = JobStatus::Running;
        assert!(scheduler.is_hung(&job, at(12, 0, 0)));
    }

    #[test]
    fn test_mark_running_requires_due_job() {
        let scheduler = JobScheduler::default();
        let freq = frequency("*/5 * * * *");
        let mut job = job_for(&freq);
        scheduler.set_enabled(&mut job, &freq, true, at(12, 0, 0)).unwrap();

        assert_eq!(
            scheduler.mark_running(&mut job, at(12, 1, 0)),
            Err(ScheduleError::NotDue("ping".to_string()))
        );
        assert!(job.is_scheduled());
    }

    #[test]
    fn test_run_completed_rearms_and_records_stats() {
        let scheduler = JobScheduler::default();
        let freq = frequency("*/5 * * * *");
        let mut job = job_for(&freq);
        scheduler.set_enabled(&mut job, &freq, true, at(12, 0, 0)).unwrap();
        scheduler.mark_running(&mut job, at(12, 5, 30)).unwrap();

        scheduler.on_run_completed(&mut job, &freq, at(12, 9, 10), true, 2.5).unwrap();
        assert_eq!(job.status, JobStatus::Scheduled);
        // 12:10 is only 50s away
        assert_eq!(job.next_run_date, Some(at(12, 15, 0)));
        assert_eq!(job.stats.number_of_runs, 1);
        assert_eq!(job.stats.successful_runs, 1);
        assert_eq!(job.stats.total_exec_time, 2.5);
    }

    #[test]
    fn test_run_completed_with_broken_frequency_parks_job() {
        let scheduler = JobScheduler::default();
        let freq = frequency("*/5 * * * *");
        let mut job = job_for(&freq);
        scheduler.set_enabled(&mut job, &freq, true, at(12, 0, 0)).unwrap();
        scheduler.mark_running(&mut job, at(12, 5, 30)).unwrap();

        let mut broken = freq.clone();
        broken.mask = "bogus".to_string();
        assert!(scheduler.on_run_completed(&mut job, &broken, at(12, 6, 0), false, 1.0).is_err());
        assert_eq!(job.stats.number_of_runs, 1);
        assert_eq!(job.status, JobStatus::Scheduled);
        assert_eq!(job.next_run_date, None);
        assert!(!scheduler.should_run_now(&job, at(13, 0, 0)));
    }

    #[test]
    fn test_invalid_inputs_leave_job_untouched() {
        let scheduler = JobScheduler::default();
        let broken = frequency("bogus");
        let mut job = job_for(&broken);
        assert!(matches!(
            scheduler.set_enabled(&mut job, &broken, true, at(12, 0, 0)),
            Err(ScheduleError::InvalidMask { .. })
        ));
        assert!(job.is_inactive());
        assert!(!job.enabled);

        let freq = frequency("* * * * *");
        let mut job = job_for(&freq);
        job.timezone = "Nowhere/Special".to_string();
        assert!(matches!(
            scheduler.set_enabled(&mut job, &freq, true, at(12, 0, 0)),
            Err(ScheduleError::InvalidTimezone(_))
        ));

        let other = frequency("0 * * * *");
        let mut job = job_for(&freq);
        assert!(matches!(
            scheduler.set_enabled(&mut job, &other, true, at(12, 0, 0)),
            Err(ScheduleError::FrequencyMismatch { .. })
        ));
        assert_eq!(job.next_run_date, None);
    }

    #[test]
    fn test_frequency_change_reschedules_enabled_jobs() {
        let scheduler = JobScheduler::default();
        let mut freq = frequency("*/5 * * * *");
        let mut enabled = job_for(&freq);
        let mut disabled = job_for(&freq);
        scheduler.set_enabled(&mut enabled, &freq, true, at(12, 0, 0)).unwrap();

        freq.mask = "0 * * * *".to_string();
        assert!(scheduler.on_frequency_changed(&mut enabled, &freq, at(12, 1, 0)).unwrap());
        assert_eq!(enabled.next_run_date, Some(at(13, 0, 0)));
        assert!(!scheduler.on_frequency_changed(&mut disabled, &freq, at(12, 1, 0)).unwrap());
        assert_eq!(disabled.next_run_date, None);
    }
}
