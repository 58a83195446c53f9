// src/router/status.rs
use crate::locator::Endpoint;
use serde::Serialize;

/// Point-in-time summary of the router for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    /// Every endpoint discovered by the last adopted selection pass.
    pub candidates: Vec<Endpoint>,
    /// The admitted endpoints requests are dispatched to.
    pub endpoints: Vec<Endpoint>,
    pub strategy: String,
    pub strategy_description: String,
    pub comparison_metric: String,
    pub affinity_options: String,
    pub interval_secs: f64,
    pub error: Option<String>,
    pub refreshed_at: Option<String>,
    pub rule_installations: u64,
    pub bindings: usize,
}
