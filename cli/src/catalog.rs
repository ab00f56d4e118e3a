use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::{frequency, Frequency, FrequencyId, Job, JobScheduler, JobStatus};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A snapshot of frequencies and jobs exported from the job store.
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub frequencies: Vec<Frequency>,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug)]
pub struct JobReport {
    pub name: String,
    pub frequency: String,
    pub timezone: String,
    pub status: JobStatus,
    pub next_run: Option<DateTime<Utc>>,
    pub due: bool,
    pub hung: bool,
    pub runs: u64,
    pub failed: u64,
    pub success_ratio: Option<f64>,
    pub avg_exec_time: Option<f64>,
}

impl Catalog {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog: {:?}", path))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let catalog = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse catalog: {:?}", path))?,
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse catalog: {:?}", path))?,
            _ => anyhow::bail!("Unsupported catalog format. Use .yaml, .yml or .json"),
        };
        Ok(catalog)
    }

    pub fn frequency(&self, id: &FrequencyId) -> Option<&Frequency> {
        self.frequencies.iter().find(|f| &f.id == id)
    }

    /// Integrity problems an operator should fix: bad or duplicate masks,
    /// duplicate job names and jobs pointing at missing frequencies.
    pub fn problems(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut problems = Vec::new();

        let mut masks: Vec<&str> = Vec::new();
        for freq in &self.frequencies {
            if let Err(e) = frequency::validate(&freq.mask, now, chrono_tz::Tz::UTC) {
                problems.push(format!("frequency {}: {}", freq.name, e));
            }
            if let Err(e) = frequency::ensure_unique(&freq.mask, masks.iter().copied()) {
                problems.push(format!("frequency {}: {}", freq.name, e));
            }
            masks.push(freq.mask.trim());
        }

        let mut names: Vec<&str> = Vec::new();
        for job in &self.jobs {
            if let Err(e) = frequency::ensure_unique_name(&job.name, names.iter().copied()) {
                problems.push(format!("job {}: {}", job.name, e));
            }
            names.push(job.name.trim());

            if self.frequency(&job.frequency).is_none() {
                problems.push(format!("job {}: unknown frequency {}", job.name, job.frequency));
            }
        }

        problems
    }

    pub fn report(&self, scheduler: &JobScheduler, now: DateTime<Utc>) -> Vec<JobReport> {
        self.jobs
            .iter()
            .map(|job| JobReport {
                name: job.name.clone(),
                frequency: self
                    .frequency(&job.frequency)
                    .map(|f| format!("{} ({})", f.name, f.mask))
                    .unwrap_or_else(|| "?".to_string()),
                timezone: job.timezone.clone(),
                status: job.status,
                next_run: job.next_run_date,
                due: scheduler.should_run_now(job, now),
                hung: scheduler.is_hung(job, now),
                runs: job.stats.number_of_runs,
                failed: job.stats.failed_runs(),
                success_ratio: job.stats.success_ratio(),
                avg_exec_time: job.stats.avg_exec_time(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    const CATALOG: &str = r#"
frequencies:
  - id: f-5
    name: Every 5 minutes
    mask: "*/5 * * * *"
  - id: f-dup
    name: Also every 5 minutes
    mask: "*/5 * * * *"
jobs:
  - id: j-1
    name: ping
    frequency: f-5
    timezone: Europe/Zagreb
    target_type: url
    target: https://example.com/ping
    timeout: 30
    enabled: true
    status: running
    last_run_date: 2024-06-01T12:00:00Z
    next_run_date: 2024-06-01T12:05:00Z
    stats:
      number_of_runs: 4
      successful_runs: 3
      total_exec_time: 6.0
  - id: j-2
    name: ping
    frequency: f-missing
    timezone: UTC
    target_type: class
    target: reports.daily
"#;

    fn load() -> Catalog {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        Catalog::from_file(file.path()).unwrap()
    }

    #[test]
    fn test_problems() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 1, 0).unwrap();
        let problems = load().problems(now);
        assert_eq!(problems.len(), 3, "{:?}", problems);
        assert!(problems[0].contains("already exists"));
        assert!(problems[1].contains("ping"));
        assert!(problems[2].contains("unknown frequency f-missing"));
    }

    #[test]
    fn test_report() {
        let catalog = load();
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 45).unwrap();
        let report = catalog.report(&JobScheduler::default(), now);

        assert_eq!(report.len(), 2);
        assert_eq!(report[0].frequency, "Every 5 minutes (*/5 * * * *)");
        assert!(report[0].due);
        assert!(report[0].hung);
        assert_eq!(report[0].success_ratio, Some(0.75));
        assert_eq!(report[0].avg_exec_time, Some(1.5));
        assert_eq!(report[0].failed, 1);

        assert_eq!(report[1].frequency, "?");
        assert!(!report[1].due);
        assert_eq!(report[1].runs, 0);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(Catalog::from_file(file.path()).is_err());
    }
}
