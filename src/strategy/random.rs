// src/strategy/random.rs
use super::{Strategy, StrategyError};
use crate::locator::Endpoint;
use rand::Rng;

#[derive(Debug, Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for RandomStrategy {
    fn select(&self, candidates: &[Endpoint]) -> Result<Vec<Endpoint>, StrategyError> {
        Ok(candidates.iter().filter(|c| c.healthy).cloned().collect())
    }

    fn next_index(&self, selection: &[Endpoint]) -> usize {
        if selection.len() <= 1 {
            return 0;
        }
        rand::thread_rng().gen_range(0..selection.len())
    }

    fn name(&self) -> &'static str {
        "random"
    }

    fn description(&self) -> String {
        "Selects all healthy endpoints and routes each request to one at random".to_string()
    }

    fn comparison_metric_name(&self) -> &'static str {
        "none"
    }
}
