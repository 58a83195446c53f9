// src/locator/probe.rs
use super::{Endpoint, Locator, LocatorError, MetricHistory};
use crate::config::ProbeConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Probes a fixed set of backends on every discovery and reports their
/// response time over a rolling window as the comparison metric.
pub struct ProbeLocator {
    targets: Vec<Endpoint>,
    path: String,
    window: usize,
    client: Client,
    history: DashMap<Endpoint, VecDeque<f64>>,
}

#[derive(Debug)]
struct ProbeOutcome {
    healthy: bool,
    response_time_ms: f64,
    error: Option<String>,
}

impl ProbeLocator {
    pub fn new(config: &ProbeConfig) -> Result<Self, LocatorError> {
        let targets = config
            .endpoints
            .iter()
            .map(|url| Endpoint::parse(url))
            .collect::<Result<Vec<_>, _>>()?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            targets,
            path: config.path.clone(),
            window: config.window.max(1),
            client,
            history: DashMap::new(),
        })
    }

    async fn probe(&self, target: &Endpoint) -> ProbeOutcome {
        let url = format!("{}{}", target.backend(), self.path);
        let start = Instant::now();

        let result = self.client.get(&url).send().await;
        let response_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let (healthy, error) = match result {
            Ok(response) if response.status().is_success() => (true, None),
            Ok(response) => (false, Some(format!("HTTP {}", response.status()))),
            Err(e) => (false, Some(e.to_string())),
        };

        ProbeOutcome {
            healthy,
            response_time_ms,
            error,
        }
    }

    fn record(&self, target: &Endpoint, response_time_ms: f64) -> MetricHistory {
        let mut samples = self.history.entry(target.clone()).or_default();
        samples.push_back(response_time_ms);
        while samples.len() > self.window {
            samples.pop_front();
        }
        summarize(&samples)
    }

    fn current(&self, target: &Endpoint) -> MetricHistory {
        self.history
            .get(target)
            .map(|samples| summarize(&samples))
            .unwrap_or_default()
    }
}

fn summarize(samples: &VecDeque<f64>) -> MetricHistory {
    if samples.is_empty() {
        return MetricHistory::default();
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    MetricHistory::new(samples.len() as u64, mean)
}

#[async_trait]
impl Locator for ProbeLocator {
    async fn discover(&self) -> Result<Vec<Endpoint>, LocatorError> {
        let outcomes =
            futures::future::join_all(self.targets.iter().map(|target| self.probe(target))).await;

        let endpoints = self
            .targets
            .iter()
            .zip(outcomes)
            .map(|(target, outcome)| {
                let history = if outcome.healthy {
                    debug!(
                        "Probe of {} took {:.1}ms",
                        target, outcome.response_time_ms
                    );
                    self.record(target, outcome.response_time_ms)
                } else {
                    warn!("Probe of {} failed: {:?}", target, outcome.error);
                    self.current(target)
                };

                target
                    .clone()
                    .with_health(outcome.healthy)
                    .with_history(history)
            })
            .collect();

        Ok(endpoints)
    }

    fn name(&self) -> &str {
        "probe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoints: Vec<String>, window: usize) -> ProbeConfig {
        ProbeConfig {
            endpoints,
            path: "/-/ready".to_string(),
            timeout_ms: 500,
            window,
        }
    }

    #[tokio::test]
    async fn test_probe_accumulates_history_for_healthy_backend() {
        let mut server = mockito::Server::new_async().await;
        let ready = server
            .mock("GET", "/-/ready")
            .with_status(200)
            .expect(3)
            .create_async()
            .await;

        let locator = ProbeLocator::new(&config(vec![server.url()], 2)).unwrap();
        for _ in 0..2 {
            locator.discover().await.unwrap();
        }
        let endpoints = locator.discover().await.unwrap();

        ready.assert_async().await;
        assert_eq!(endpoints.len(), 1);
        assert!(endpoints[0].healthy);
        // window of two keeps only the latest samples
        assert_eq!(endpoints[0].history.samples, 2);
        assert!(endpoints[0].history.value.is_some());
    }

    #[tokio::test]
    async fn test_probe_marks_failing_backend_unhealthy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/-/ready")
            .with_status(503)
            .create_async()
            .await;

        let locator = ProbeLocator::new(&config(vec![server.url()], 5)).unwrap();
        let endpoints = locator.discover().await.unwrap();

        assert_eq!(endpoints.len(), 1);
        assert!(!endpoints[0].healthy);
        assert_eq!(endpoints[0].history.samples, 0);
    }
}
