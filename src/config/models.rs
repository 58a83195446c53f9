// src/config/models.rs
use crate::affinity::AffinityOption;
use crate::locator::Endpoint;
use anyhow::{bail, ensure, Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default)]
    pub strategy: StrategyConfig,

    #[serde(default)]
    pub affinity: AffinityConfig,

    #[serde(default)]
    pub locators: Vec<LocatorConfig>,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub forward: ForwardConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.refresh_interval_secs > 0,
            "refresh_interval_secs must be greater than zero"
        );
        ensure!(
            self.retry.max_attempts > 0,
            "retry.max_attempts must be at least 1"
        );
        ensure!(
            self.retry.backoff_base_ms <= self.retry.backoff_max_ms,
            "retry.backoff_base_ms must not exceed retry.backoff_max_ms"
        );
        ensure!(self.forward.timeout_ms > 0, "forward.timeout_ms must be greater than zero");
        ensure!(
            self.forward.max_body_bytes > 0,
            "forward.max_body_bytes must be greater than zero"
        );

        if let StrategyConfig::MinimumHistory { best_k: Some(0), .. } = self.strategy {
            bail!("strategy best_k must be greater than zero when set");
        }

        for locator in &self.locators {
            locator.validate()?;
        }

        Ok(())
    }
}

/// Backend selection strategy, tagged by `name`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum StrategyConfig {
    Random,
    RoundRobin,
    MinimumHistory {
        #[serde(default = "default_min_samples")]
        min_samples: u64,
        #[serde(default)]
        best_k: Option<usize>,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::Random
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AffinityConfig {
    #[serde(default)]
    pub options: Vec<AffinityOption>,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl AffinityConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// Discovery source, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocatorConfig {
    Static {
        endpoints: Vec<String>,
    },
    Probe(ProbeConfig),
    Http {
        url: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
}

impl LocatorConfig {
    fn validate(&self) -> Result<()> {
        match self {
            LocatorConfig::Static { endpoints } => validate_endpoints(endpoints),
            LocatorConfig::Probe(probe) => {
                ensure!(probe.window > 0, "probe window must be greater than zero");
                ensure!(probe.timeout_ms > 0, "probe timeout_ms must be greater than zero");
                validate_endpoints(&probe.endpoints)
            }
            LocatorConfig::Http { url, .. } => {
                url::Url::parse(url).with_context(|| format!("invalid discovery url '{}'", url))?;
                Ok(())
            }
        }
    }
}

fn validate_endpoints(endpoints: &[String]) -> Result<()> {
    for endpoint in endpoints {
        Endpoint::parse(endpoint)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    pub endpoints: Vec<String>,
    #[serde(default = "default_probe_path")]
    pub path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_probe_window")]
    pub window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        }
    }
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForwardConfig {
    #[serde(default = "default_forward_timeout_ms")]
    pub timeout_ms: u64,
    /// Largest request body buffered for forwarding; larger ones get 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_forward_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ForwardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
            path: default_metrics_path(),
            status_path: default_status_path(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_refresh_interval_secs() -> u64 {
    10
}

fn default_min_samples() -> u64 {
    5
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_probe_path() -> String {
    "/".to_string()
}

fn default_probe_window() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    2
}

fn default_forward_timeout_ms() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    crate::proxy::DEFAULT_MAX_BODY_BYTES
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9100
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_status_path() -> String {
    "/status".to_string()
}
