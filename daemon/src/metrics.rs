use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for Prometheus-compatible output
pub struct MetricsCollector {
    requests: Arc<DashMap<String, AtomicU64>>,
    request_errors: Arc<DashMap<String, AtomicU64>>,
    due_decisions: Arc<DashMap<String, AtomicU64>>,
    hang_recoveries: Arc<DashMap<String, AtomicU64>>,
    job_successes: Arc<DashMap<String, AtomicU64>>,
    job_failures: Arc<DashMap<String, AtomicU64>>,
    job_durations: Arc<DashMap<String, Vec<u64>>>, // Store last 100 durations for percentiles
    connections: Arc<AtomicU64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(DashMap::new()),
            request_errors: Arc::new(DashMap::new()),
            due_decisions: Arc::new(DashMap::new()),
            hang_recoveries: Arc::new(DashMap::new()),
            job_successes: Arc::new(DashMap::new()),
            job_failures: Arc::new(DashMap::new()),
            job_durations: Arc::new(DashMap::new()),
            connections: Arc::new(AtomicU64::new(0)),
        }
    }

    fn increment(map: &DashMap<String, AtomicU64>, key: &str) {
        map.entry(key.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_request(&self, operation: &str) {
        Self::increment(&self.requests, operation);
    }

    pub fn record_error(&self, operation: &str) {
        Self::increment(&self.request_errors, operation);
    }

    pub fn record_due(&self, job_id: &str) {
        Self::increment(&self.due_decisions, job_id);
    }

    pub fn record_hang_recovery(&self, job_id: &str) {
        Self::increment(&self.hang_recoveries, job_id);
    }

    pub fn record_completion(&self, job_id: &str, success: bool, duration_ms: u64) {
        if success {
            Self::increment(&self.job_successes, job_id);
        } else {
            Self::increment(&self.job_failures, job_id);
        }

        let mut entry = self.job_durations
            .entry(job_id.to_string())
            .or_insert_with(Vec::new);

        entry.push(duration_ms);

        // Trim to last 100 entries
        let len = entry.len();
        if len > 100 {
            entry.drain(0..len - 100);
        }
    }

    pub fn increment_connections(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn requests_for(&self, operation: &str) -> u64 {
        self.requests
            .get(operation)
            .map(|v| v.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn export_counter(
        output: &mut String,
        name: &str,
        help: &str,
        label: &str,
        map: &DashMap<String, AtomicU64>,
    ) {
        output.push_str(&format!("# HELP {} {}\n", name, help));
        output.push_str(&format!("# TYPE {} counter\n", name));
        let mut rows: Vec<(String, u64)> = map
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (key, value) in rows {
            output.push_str(&format!("{}{{{}=\"{}\"}} {}\n", name, label, key, value));
        }
        output.push('\n');
    }

    /// Generate Prometheus-compatible metrics output
    pub fn export(&self) -> String {
        let mut output = String::new();

        output.push_str(
            "# HELP cronmgr_connections_total Total number of accepted client connections\n",
        );
        output.push_str("# TYPE cronmgr_connections_total counter\n");
        output.push_str(&format!(
            "cronmgr_connections_total {}\n\n",
            self.connections.load(Ordering::Relaxed)
        ));

        let counters = [
            (
                "cronmgr_requests_total",
                "Total number of requests by operation",
                "operation",
                &self.requests,
            ),
            (
                "cronmgr_request_errors_total",
                "Total number of failed requests by operation",
                "operation",
                &self.request_errors,
            ),
            (
                "cronmgr_job_due_total",
                "Number of times a job was reported due",
                "job_id",
                &self.due_decisions,
            ),
            (
                "cronmgr_job_hang_recoveries_total",
                "Number of times a hung job was released for another run",
                "job_id",
                &self.hang_recoveries,
            ),
            (
                "cronmgr_job_successes_total",
                "Total number of successful job runs reported",
                "job_id",
                &self.job_successes,
            ),
            (
                "cronmgr_job_failures_total",
                "Total number of failed job runs reported",
                "job_id",
                &self.job_failures,
            ),
        ];
        for (name, help, label, map) in counters {
            Self::export_counter(&mut output, name, help, label, map);
        }

        // Duration percentiles
        output.push_str("# HELP cronmgr_job_duration_ms Job run duration percentiles\n");
        output.push_str("# TYPE cronmgr_job_duration_ms gauge\n");
        for entry in self.job_durations.iter() {
            let mut durations = entry.value().clone();
            if !durations.is_empty() {
                durations.sort_unstable();
                for (quantile, p) in [("0.5", 50.0), ("0.95", 95.0), ("0.99", 99.0)] {
                    output.push_str(&format!(
                        "cronmgr_job_duration_ms{{job_id=\"{}\",quantile=\"{}\"}} {}\n",
                        entry.key(), quantile, percentile(&durations, p)
                    ));
                }
            }
        }

        output
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn percentile(sorted_data: &[u64], p: f64) -> u64 {
    if sorted_data.is_empty() {
        return 0;
    }
    let index = ((p / 100.0) * (sorted_data.len() as f64 - 1.0)).round() as usize;
    sorted_data[index.min(sorted_data.len() - 1)]
}
