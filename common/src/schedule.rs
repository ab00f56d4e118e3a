use crate::error::{Result, ScheduleError};
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

const WEEKDAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// A validated cron mask.
///
/// Masks use the classic five-field layout (minute, hour, day-of-month, month,
/// day-of-week) with an optional sixth year field, or one of the `@daily` style
/// macros. Day-of-week counts from Sunday = 0 (7 is accepted as Sunday too).
///
/// As in classic cron, when both day-of-month and day-of-week are restricted a
/// day matches if either field does (`0 0 13 * 5` fires on the 13th and on
/// every Friday). Fields are matched against wall-clock time in the zone: a
/// time repeated by a DST fall-back fires once, at its first occurrence, and a
/// time skipped by a spring-forward gap fires just after the gap.
#[derive(Debug, Clone)]
pub struct CronMask {
    source: String,
    schedules: Vec<Schedule>,
}

impl CronMask {
    pub fn parse(mask: &str) -> Result<Self> {
        let source = mask.trim();
        let schedules = to_cron_expressions(source)?
            .iter()
            .map(|expression| Schedule::from_str(expression))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ScheduleError::invalid_mask(source, e))?;

        Ok(Self {
            source: source.to_string(),
            schedules,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the `offset`-th fire time strictly after `reference`, evaluated
    /// in `zone`. Offset 0 is the first one.
    pub fn next_fire_time(
        &self,
        reference: DateTime<Utc>,
        offset: usize,
        zone: Tz,
    ) -> Result<DateTime<Utc>> {
        self.after(reference, zone)
            .nth(offset)
            .ok_or_else(|| ScheduleError::invalid_mask(&self.source, "mask never fires again"))
    }

    /// Fire times strictly after `reference`, in ascending order.
    pub fn after(
        &self,
        reference: DateTime<Utc>,
        zone: Tz,
    ) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        // Wall-clock times are walked as if they were UTC and mapped into the zone afterwards
        let wall_clock = Utc.from_utc_datetime(&reference.with_timezone(&zone).naive_local());
        let mut streams: Vec<_> = self
            .schedules
            .iter()
            .map(|schedule| schedule.after(&wall_clock).peekable())
            .collect();

        let merged = std::iter::from_fn(move || {
            let (index, _) = streams
                .iter_mut()
                .enumerate()
                .filter_map(|(i, stream)| stream.peek().map(|wall| (i, *wall)))
                .min_by_key(|(_, wall)| *wall)?;
            streams[index].next()
        });

        let mut last = reference;
        merged.filter_map(move |wall| {
            let at = resolve_wall_clock(zone, wall.naive_utc(), last);
            if at > last {
                last = at;
                Some(at)
            } else {
                None
            }
        })
    }

    pub fn upcoming(&self, reference: DateTime<Utc>, count: usize, zone: Tz) -> Vec<DateTime<Utc>> {
        self.after(reference, zone).take(count).collect()
    }
}

impl std::fmt::Display for CronMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

pub fn next_fire_time(
    mask: &str,
    reference: DateTime<Utc>,
    offset: usize,
    zone: Tz,
) -> Result<DateTime<Utc>> {
    CronMask::parse(mask)?.next_fire_time(reference, offset, zone)
}

/// Accepts IANA names as stored by operators, where spaces may stand in for
/// underscores ("America/New York").
pub fn parse_timezone(name: &str) -> Result<Tz> {
    let normalized = name.trim().replace(' ', "_");
    normalized
        .parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

pub fn list_timezones() -> Vec<String> {
    chrono_tz::TZ_VARIANTS
        .iter()
        .map(|tz| tz.name().replace('_', " "))
        .collect()
}

/// Maps a wall-clock time in `zone` to an instant, preferring the earliest
/// mapping later than `after`.
fn resolve_wall_clock(zone: Tz, wall: NaiveDateTime, after: DateTime<Utc>) -> DateTime<Utc> {
    match zone.from_local_datetime(&wall) {
        LocalResult::Single(at) => at.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, latest) => {
            let earliest = earliest.with_timezone(&Utc);
            if earliest > after {
                earliest
            } else {
                latest.with_timezone(&Utc)
            }
        }
        // Inside a spring-forward gap: keep the offset in force before it
        LocalResult::None => {
            let before = zone.offset_from_utc_datetime(&(wall - Duration::days(1))).fix();
            Utc.from_utc_datetime(&(wall - Duration::seconds(i64::from(before.local_minus_utc()))))
        }
    }
}

fn expand_macro(mask: &str) -> Option<&'static str> {
    match mask.to_ascii_lowercase().as_str() {
        "@yearly" | "@annually" => Some("0 0 1 1 *"),
        "@monthly" => Some("0 0 1 * *"),
        "@weekly" => Some("0 0 * * 0"),
        "@daily" | "@midnight" => Some("0 0 * * *"),
        "@hourly" => Some("0 * * * *"),
        _ => None,
    }
}

fn is_unrestricted(field: &str) -> bool {
    field.starts_with('*') || field.starts_with('?')
}

/// Rewrites a classic mask into the seconds-first layout the `cron` crate reads.
///
/// The `cron` crate requires both day fields to match, so a mask restricting
/// both becomes two expressions, one per day field.
fn to_cron_expressions(source: &str) -> Result<Vec<String>> {
    let mask = if source.starts_with('@') {
        expand_macro(source).ok_or_else(|| ScheduleError::invalid_mask(source, "unknown macro"))?
    } else {
        source
    };

    let fields: Vec<&str> = mask.split_whitespace().collect();
    if fields.len() != 5 && fields.len() != 6 {
        return Err(ScheduleError::invalid_mask(
            source,
            format!("expected 5 or 6 fields, found {}", fields.len()),
        ));
    }

    let bounds = [("minute", 0, 59), ("hour", 0, 23), ("day-of-month", 1, 31), ("month", 1, 12)];
    for (field, (name, min, max)) in fields.iter().zip(bounds) {
        check_field(field, name, min, max)
            .map_err(|reason| ScheduleError::invalid_mask(source, reason))?;
    }
    let day_of_week = translate_day_of_week(fields[4])
        .map_err(|reason| ScheduleError::invalid_mask(source, reason))?;

    let day_of_month = fields[2].replace('?', "*");
    let month = fields[3].to_ascii_uppercase();
    let expression = |day_of_month: &str, day_of_week: &str| {
        let mut parts = vec!["0", fields[0], fields[1], day_of_month, month.as_str(), day_of_week];
        if let Some(year) = fields.get(5) {
            parts.push(year);
        }
        parts.join(" ")
    };

    if is_unrestricted(fields[2]) || is_unrestricted(fields[4]) {
        Ok(vec![expression(&day_of_month, &day_of_week)])
    } else {
        Ok(vec![expression(&day_of_month, "*"), expression("*", &day_of_week)])
    }
}

fn parse_step(step: &str) -> std::result::Result<usize, String> {
    match step.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("invalid step '{}'", step)),
    }
}

fn check_field(field: &str, name: &str, min: u32, max: u32) -> std::result::Result<(), String> {
    for item in field.split(',') {
        let range = match item.split_once('/') {
            Some((range, step)) => {
                parse_step(step)?;
                range
            }
            None => item,
        };
        if range == "*" || range == "?" {
            continue;
        }
        for bound in range.split('-') {
            if bound.is_empty() {
                return Err(format!("empty {} value in '{}'", name, field));
            }
            // Month names are left for the cron parser
            if !bound.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let value: u32 = bound
                .parse()
                .map_err(|_| format!("invalid {} value '{}'", name, bound))?;
            if value < min || value > max {
                return Err(format!("{} value {} out of range {}-{}", name, value, min, max));
            }
        }
    }
    Ok(())
}

fn parse_weekday(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(n) if n <= 7 => Ok(n),
        _ => Err(format!("day-of-week value '{}' out of range 0-7", s)),
    }
}

/// Numeric day-of-week items are expanded into weekday names so Sunday = 0
/// semantics survive the `cron` crate's Sunday = 1 numbering.
fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    if field == "*" || field == "?" {
        return Ok("*".to_string());
    }

    let mut days = [false; 7];
    let mut named = Vec::new();

    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            named.push(item.to_ascii_uppercase());
            continue;
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(parse_step(step)?)),
            None => (item, None),
        };

        let (start, end) = if range == "*" || range == "?" {
            (0, 6)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_weekday(a)?, parse_weekday(b)?)
        } else {
            let day = parse_weekday(range)?;
            (day, if step.is_some() { 6 } else { day })
        };

        if start > end {
            return Err(format!("invalid day-of-week range '{}'", range));
        }

        for day in (start..=end).step_by(step.unwrap_or(1)) {
            days[day % 7] = true;
        }
    }

    let mut items: Vec<String> = WEEKDAYS
        .iter()
        .zip(days)
        .filter(|(_, on)| *on)
        .map(|(name, _)| name.to_string())
        .collect();
    items.extend(named);
    Ok(items.join(","))
}
