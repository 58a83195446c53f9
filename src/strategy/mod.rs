// src/strategy/mod.rs
mod algorithm;
mod minimum_history;
mod random;
mod round_robin;

pub use algorithm::{Strategy, StrategyError};
pub use minimum_history::MinimumHistoryStrategy;
pub use random::RandomStrategy;
pub use round_robin::RoundRobinStrategy;

use crate::config::StrategyConfig;
use std::sync::Arc;

pub fn create_strategy(config: &StrategyConfig) -> Arc<dyn Strategy> {
    match config {
        StrategyConfig::Random => Arc::new(RandomStrategy::new()),
        StrategyConfig::RoundRobin => Arc::new(RoundRobinStrategy::new()),
        StrategyConfig::MinimumHistory {
            min_samples,
            best_k,
        } => Arc::new(MinimumHistoryStrategy::new(*min_samples, *best_k)),
    }
}
