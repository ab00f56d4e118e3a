use crate::error::{Result, ScheduleError};
use crate::job::{Frequency, FrequencyId, Job};
use crate::schedule::CronMask;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// The next two fire times of a mask, shown to operators before they save it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub first: DateTime<Utc>,
    pub second: DateTime<Utc>,
    pub timezone: String,
}

impl Preview {
    fn format_in_zone(&self, at: DateTime<Utc>) -> String {
        match crate::schedule::parse_timezone(&self.timezone) {
            Ok(zone) => at.with_timezone(&zone).format("%Y-%m-%d %H:%M:00").to_string(),
            Err(_) => at.format("%Y-%m-%d %H:%M:00").to_string(),
        }
    }
}

impl std::fmt::Display for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.format_in_zone(self.first), self.format_in_zone(self.second))
    }
}

impl Frequency {
    pub fn new(name: &str, mask: &str, now: DateTime<Utc>) -> Result<Self> {
        let mask = mask.trim();
        validate(mask, now, Tz::UTC)?;
        Ok(Self {
            id: FrequencyId::new(),
            name: name.trim().to_string(),
            mask: mask.to_string(),
        })
    }
}

fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Parses `mask` and previews its next two fire times after `now`.
pub fn validate(mask: &str, now: DateTime<Utc>, zone: Tz) -> Result<Preview> {
    let cron = CronMask::parse(mask)?;
    let first = cron.next_fire_time(now, 0, zone)?;
    let second = cron.next_fire_time(now, 1, zone)?;

    Ok(Preview {
        first: truncate_to_minute(first),
        second: truncate_to_minute(second),
        timezone: zone.name().to_string(),
    })
}

pub fn ensure_unique<'a>(mask: &str, existing: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mask = mask.trim();
    if existing.into_iter().any(|m| m == mask) {
        return Err(ScheduleError::DuplicateMask(mask.to_string()));
    }
    Ok(())
}

pub fn ensure_unique_name<'a>(
    name: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let name = name.trim();
    if existing.into_iter().any(|n| n == name) {
        return Err(ScheduleError::DuplicateName(name.to_string()));
    }
    Ok(())
}

/// The on-demand preview used while editing a frequency: validate first, then
/// reject masks another frequency already uses.
pub fn check<'a>(
    mask: &str,
    existing: impl IntoIterator<Item = &'a str>,
    now: DateTime<Utc>,
    zone: Tz,
) -> Result<Preview> {
    let mask = mask.trim();
    let preview = validate(mask, now, zone)?;
    ensure_unique(mask, existing)?;
    Ok(preview)
}

/// A frequency may only be deleted once no job points at it.
pub fn ensure_deletable(frequency: &Frequency, jobs: &[Job]) -> Result<()> {
    let users = jobs.iter().filter(|job| job.frequency == frequency.id).count();
    if users > 0 {
        log::warn!("Refusing to delete frequency {} used by {} job(s)", frequency.name, users);
        return Err(ScheduleError::FrequencyInUse {
            frequency: frequency.name.clone(),
            jobs: users,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TargetType;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 4, 5).unwrap()
    }

    #[test]
    fn test_preview_shows_next_two_fire_times() {
        let preview = validate("*/15 * * * *", now(), Tz::UTC).unwrap();
        assert_eq!(preview.first, Utc.with_ymd_and_hms(2024, 6, 1, 12, 15, 0).unwrap());
        assert_eq!(preview.second, Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap());
        assert_eq!(preview.to_string(), "(2024-06-01 12:15:00, 2024-06-01 12:30:00)");
    }

    #[test]
    fn test_preview_is_rendered_in_zone() {
        let zone = crate::schedule::parse_timezone("Europe/Zagreb").unwrap();
        let preview = validate("0 9 * * *", now(), zone).unwrap();
        // 09:00 CEST
        assert_eq!(preview.first, Utc.with_ymd_and_hms(2024, 6, 2, 7, 0, 0).unwrap());
        assert_eq!(preview.to_string(), "(2024-06-02 09:00:00, 2024-06-03 09:00:00)");
    }

    #[test]
    fn test_bogus_mask_has_no_preview() {
        assert!(matches!(
            validate("bogus", now(), Tz::UTC),
            Err(ScheduleError::InvalidMask { .. })
        ));
    }

    #[test]
    fn test_duplicate_mask() {
        let existing = ["*/5 * * * *", "0 0 * * *"];
        assert_eq!(
            ensure_unique(" 0 0 * * * ", existing),
            Err(ScheduleError::DuplicateMask("0 0 * * *".to_string()))
        );
        assert!(ensure_unique("0 1 * * *", existing).is_ok());
    }

    #[test]
    fn test_duplicate_name() {
        assert!(matches!(
            ensure_unique_name("nightly", ["hourly", "nightly"]),
            Err(ScheduleError::DuplicateName(_))
        ));
        assert!(ensure_unique_name("weekly", ["hourly", "nightly"]).is_ok());
    }

    #[test]
    fn test_check_validates_before_uniqueness() {
        assert!(matches!(
            check("bogus", ["bogus"], now(), Tz::UTC),
            Err(ScheduleError::InvalidMask { .. })
        ));
        assert!(matches!(
            check("*/5 * * * *", ["*/5 * * * *"], now(), Tz::UTC),
            Err(ScheduleError::DuplicateMask(_))
        ));
        assert!(check("*/5 * * * *", ["*/10 * * * *"], now(), Tz::UTC).is_ok());
    }

    #[test]
    fn test_frequency_new() {
        let frequency = Frequency::new(" Every hour ", " 0 * * * * ", now()).unwrap();
        assert_eq!(frequency.name, "Every hour");
        assert_eq!(frequency.mask, "0 * * * *");
        assert!(Frequency::new("Broken", "61 * * * *", now()).is_err());
    }

    #[test]
    fn test_referenced_frequency_cannot_be_deleted() {
        let frequency = Frequency::new("Hourly", "0 * * * *", now()).unwrap();
        let other = Frequency::new("Daily", "0 0 * * *", now()).unwrap();
        let jobs = vec![Job::new(
            "ping",
            &frequency.id,
            "UTC",
            TargetType::Url,
            "https://example.com",
        )];

        assert!(matches!(
            ensure_deletable(&frequency, &jobs),
            Err(ScheduleError::FrequencyInUse { jobs: 1, .. })
        ));
        assert!(ensure_deletable(&other, &jobs).is_ok());
    }
}
