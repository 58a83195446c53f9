// src/strategy/round_robin.rs
use super::{Strategy, StrategyError};
use crate::locator::Endpoint;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    counter: AtomicUsize,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Strategy for RoundRobinStrategy {
    fn select(&self, candidates: &[Endpoint]) -> Result<Vec<Endpoint>, StrategyError> {
        Ok(candidates.iter().filter(|c| c.healthy).cloned().collect())
    }

    fn next_index(&self, selection: &[Endpoint]) -> usize {
        if selection.is_empty() {
            return 0;
        }
        self.counter.fetch_add(1, Ordering::Relaxed) % selection.len()
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn description(&self) -> String {
        "Selects all healthy endpoints and rotates requests across them in order".to_string()
    }

    fn comparison_metric_name(&self) -> &'static str {
        "none"
    }
}
