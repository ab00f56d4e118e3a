use serde::{Deserialize, Serialize};

/// Running totals of a job's completed runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub number_of_runs: u64,
    pub successful_runs: u64,
    /// Seconds, summed over all runs.
    pub total_exec_time: f64,
}

impl RunStats {
    pub fn fold(self, success: bool, elapsed_seconds: f64) -> Self {
        Self {
            number_of_runs: self.number_of_runs + 1,
            successful_runs: self.successful_runs + u64::from(success),
            total_exec_time: self.total_exec_time + elapsed_seconds,
        }
    }

    /// Combines two partial aggregates, e.g. totals gathered on different runners.
    pub fn merge(self, other: RunStats) -> Self {
        Self {
            number_of_runs: self.number_of_runs + other.number_of_runs,
            successful_runs: self.successful_runs + other.successful_runs,
            total_exec_time: self.total_exec_time + other.total_exec_time,
        }
    }

    pub fn failed_runs(&self) -> u64 {
        self.number_of_runs.saturating_sub(self.successful_runs)
    }

    /// `None` until the job has run at least once.
    pub fn success_ratio(&self) -> Option<f64> {
        if self.number_of_runs == 0 {
            return None;
        }
        Some(self.successful_runs as f64 / self.number_of_runs as f64)
    }

    pub fn avg_exec_time(&self) -> Option<f64> {
        if self.number_of_runs == 0 {
            return None;
        }
        Some(self.total_exec_time / self.number_of_runs as f64)
    }
}
