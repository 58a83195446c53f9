// src/metrics/collector.rs
use anyhow::{Context, Result};
use prometheus::core::Collector;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Selection metrics
    pub selected_backends: IntGauge,
    pub selection_events_total: IntCounter,
    pub selection_errors_total: IntCounter,
    pub rewrite_rule_installs_total: IntCounter,

    // Affinity metrics
    pub affinity_lookups_total: IntCounterVec,

    // Request metrics
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,

    // Backend metrics
    pub backend_requests_total: IntCounterVec,
    pub backend_request_duration_seconds: HistogramVec,
}

const NAMESPACE: &str = "router";

fn register<M>(registry: &Registry, metric: M) -> Result<M>
where
    M: Collector + Clone + 'static,
{
    registry
        .register(Box::new(metric.clone()))
        .context("Failed to register metric")?;
    Ok(metric)
}

fn opts(name: &str, help: &str) -> Opts {
    Opts::new(name, help).namespace(NAMESPACE)
}

fn histogram(name: &str, help: &str) -> HistogramOpts {
    HistogramOpts::new(name, help).namespace(NAMESPACE)
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            selected_backends: register(
                registry,
                IntGauge::with_opts(opts(
                    "selected_backends",
                    "Number of backends admitted by the last selection",
                ))?,
            )?,
            selection_events_total: register(
                registry,
                IntCounter::with_opts(opts(
                    "selection_events_total",
                    "Completed selection passes",
                ))?,
            )?,
            selection_errors_total: register(
                registry,
                IntCounter::with_opts(opts(
                    "selection_errors_total",
                    "Selection passes that reported an error",
                ))?,
            )?,
            rewrite_rule_installs_total: register(
                registry,
                IntCounter::with_opts(opts(
                    "rewrite_rule_installs_total",
                    "Times a new rewrite rule was installed",
                ))?,
            )?,
            affinity_lookups_total: register(
                registry,
                IntCounterVec::new(
                    opts("affinity_lookups_total", "Affinity lookups by result"),
                    &["result"],
                )?,
            )?,
            requests_total: register(
                registry,
                IntCounterVec::new(
                    opts("requests_total", "Proxied requests by method and status"),
                    &["method", "status_code"],
                )?,
            )?,
            request_duration_seconds: register(
                registry,
                HistogramVec::new(
                    histogram("request_duration_seconds", "End-to-end request latency"),
                    &["method", "status_code"],
                )?,
            )?,
            backend_requests_total: register(
                registry,
                IntCounterVec::new(
                    opts("backend_requests_total", "Forwarded requests by backend and outcome"),
                    &["backend", "status"],
                )?,
            )?,
            backend_request_duration_seconds: register(
                registry,
                HistogramVec::new(
                    histogram(
                        "backend_request_duration_seconds",
                        "Time spent waiting on the backend, retries included",
                    ),
                    &["backend"],
                )?,
            )?,
        })
    }

    pub fn record_selection(&self, admitted: usize, failed: bool) {
        self.selected_backends.set(admitted as i64);
        self.selection_events_total.inc();
        if failed {
            self.selection_errors_total.inc();
        }
    }

    pub fn record_rule_install(&self) {
        self.rewrite_rule_installs_total.inc();
    }

    pub fn record_affinity(&self, result: &str) {
        self.affinity_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn record_request(&self, method: &str, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        let labels = [method, status.as_str()];
        self.requests_total.with_label_values(&labels).inc();
        self.request_duration_seconds
            .with_label_values(&labels)
            .observe(duration.as_secs_f64());
    }

    pub fn record_backend_request(&self, backend: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "failure" };
        self.backend_requests_total
            .with_label_values(&[backend, status])
            .inc();

        self.backend_request_duration_seconds
            .with_label_values(&[backend])
            .observe(duration.as_secs_f64());
    }
}

/// Wall-clock stopwatch for latency histograms.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
