//! Prometheus metrics for monitoring gridstat.
//!
//! Covers snapshot fetches, cache requests and the shape of the latest
//! scheduler snapshot.

use crate::grid::JobInfo;
use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// All metrics for the gridstat service
pub struct Metrics {
    pub registry: Registry,

    // Fetch metrics
    pub fetch_total: CounterVec,
    pub fetch_duration_seconds: HistogramVec,
    pub refresh_consecutive_failures: Gauge,

    // Cache metrics
    pub cache_requests_total: CounterVec,
    pub cache_snapshot_generation: Gauge,
    pub cache_snapshot_age_seconds: Gauge,

    // Scheduler metrics
    pub jobs_running: Gauge,
    pub jobs_pending: Gauge,
    pub jobs_error: Gauge,
    pub hosts_total: Gauge,

    // System metrics
    pub uptime_seconds: Gauge,
    started_at: Instant,
}

impl Metrics {
    /// Create a new metrics registry with all metrics
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let fetch_total = CounterVec::new(
            Opts::new(
                "gridstat_fetch_total",
                "Snapshot fetches by trigger and outcome",
            ),
            &["trigger", "outcome"],
        )?;
        registry.register(Box::new(fetch_total.clone()))?;

        let fetch_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gridstat_fetch_duration_seconds",
                "Time spent fetching and parsing a snapshot",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 3.0, 5.0, 10.0]),
            &["trigger"],
        )?;
        registry.register(Box::new(fetch_duration_seconds.clone()))?;

        let refresh_consecutive_failures = Gauge::with_opts(Opts::new(
            "gridstat_refresh_consecutive_failures",
            "Background refreshes that have failed in a row",
        ))?;
        registry.register(Box::new(refresh_consecutive_failures.clone()))?;

        let cache_requests_total = CounterVec::new(
            Opts::new(
                "gridstat_cache_requests_total",
                "Cache requests by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(cache_requests_total.clone()))?;

        let cache_snapshot_generation = Gauge::with_opts(Opts::new(
            "gridstat_cache_snapshot_generation",
            "Number of snapshots published to the cache",
        ))?;
        registry.register(Box::new(cache_snapshot_generation.clone()))?;

        let cache_snapshot_age_seconds = Gauge::with_opts(Opts::new(
            "gridstat_cache_snapshot_age_seconds",
            "Time since the current snapshot was published",
        ))?;
        registry.register(Box::new(cache_snapshot_age_seconds.clone()))?;

        let jobs_running = Gauge::with_opts(Opts::new(
            "gridstat_jobs_running",
            "Running jobs in the current snapshot",
        ))?;
        registry.register(Box::new(jobs_running.clone()))?;

        let jobs_pending = Gauge::with_opts(Opts::new(
            "gridstat_jobs_pending",
            "Pending jobs in the current snapshot",
        ))?;
        registry.register(Box::new(jobs_pending.clone()))?;

        let jobs_error = Gauge::with_opts(Opts::new(
            "gridstat_jobs_error",
            "Jobs in an error state in the current snapshot",
        ))?;
        registry.register(Box::new(jobs_error.clone()))?;

        let hosts_total = Gauge::with_opts(Opts::new(
            "gridstat_hosts_total",
            "Queue instances in the current snapshot",
        ))?;
        registry.register(Box::new(hosts_total.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new(
            "gridstat_uptime_seconds",
            "Seconds since the process started",
        ))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry,
            fetch_total,
            fetch_duration_seconds,
            refresh_consecutive_failures,
            cache_requests_total,
            cache_snapshot_generation,
            cache_snapshot_age_seconds,
            jobs_running,
            jobs_pending,
            jobs_error,
            hosts_total,
            uptime_seconds,
            started_at: Instant::now(),
        })
    }

    /// Record a snapshot fetch
    pub fn record_fetch(&self, trigger: &str, success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "error" };
        self.fetch_total
            .with_label_values(&[trigger, outcome])
            .inc();
        self.fetch_duration_seconds
            .with_label_values(&[trigger])
            .observe(duration_secs);
    }

    /// Record a cache request
    pub fn record_request(&self, operation: &str, outcome: &str) {
        self.cache_requests_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn set_consecutive_failures(&self, failures: u32) {
        self.refresh_consecutive_failures.set(failures as f64);
    }

    pub fn set_generation(&self, generation: u64) {
        self.cache_snapshot_generation.set(generation as f64);
    }

    /// Update scheduler metrics from a snapshot
    pub fn update_snapshot_metrics(&self, info: &JobInfo, age_secs: f64) {
        let jobs = info.jobs();
        let running = jobs.iter().filter(|j| j.is_running()).count();
        let errored = jobs.iter().filter(|j| j.is_in_error_state()).count();

        self.jobs_running.set(running as f64);
        self.jobs_pending.set(info.pending().len() as f64);
        self.jobs_error.set(errored as f64);
        self.hosts_total.set(info.hosts().len() as f64);
        self.cache_snapshot_age_seconds.set(age_secs);
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> String {
        self.uptime_seconds
            .set(self.started_at.elapsed().as_secs_f64());

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        match encoder.encode_to_string(&metric_families) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "Failed to encode metrics");
                String::new()
            }
        }
    }
}

/// Shared metrics instance
pub type SharedMetrics = Arc<Metrics>;

/// Create a shared metrics instance
pub fn create_metrics() -> Result<SharedMetrics, prometheus::Error> {
    Ok(Arc::new(Metrics::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Host, Job};

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        let output = metrics.render();
        assert!(output.contains("gridstat_jobs_running"));
        assert!(output.contains("gridstat_uptime_seconds"));
    }

    #[test]
    fn test_fetch_and_request_recording() {
        let metrics = Metrics::new().unwrap();
        metrics.record_fetch("refresh", true, 0.2);
        metrics.record_fetch("update", false, 0.1);
        metrics.record_request("get", "success");

        let output = metrics.render();
        assert!(output.contains("gridstat_fetch_total"));
        assert!(output.contains(r#"outcome="error""#));
        assert!(output.contains("gridstat_cache_requests_total"));
    }

    #[test]
    fn test_snapshot_metrics() {
        let metrics = Metrics::new().unwrap();
        let mut info = JobInfo::default();
        info.queue_info.queues.push(Host {
            name: "all.q@node1".to_string(),
            job_list: vec![Job {
                state: "r".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });
        info.pending_jobs.job_list.push(Job {
            state: "Eqw".to_string(),
            ..Default::default()
        });

        metrics.update_snapshot_metrics(&info, 1.5);

        assert_eq!(metrics.jobs_running.get(), 1.0);
        assert_eq!(metrics.jobs_pending.get(), 1.0);
        assert_eq!(metrics.jobs_error.get(), 1.0);
        assert_eq!(metrics.hosts_total.get(), 1.0);
    }
}
