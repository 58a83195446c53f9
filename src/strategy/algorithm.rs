// src/strategy/algorithm.rs
use crate::locator::Endpoint;
use std::fmt;

/// Turns discovered candidates into an admitted selection and picks an index
/// into that selection per request.
///
/// Any cursor a strategy keeps is private to it and only advanced by
/// `next_index`.
pub trait Strategy: Send + Sync + fmt::Debug {
    /// Admitted subset of `candidates`. An empty result is not an error.
    fn select(&self, candidates: &[Endpoint]) -> Result<Vec<Endpoint>, StrategyError>;

    /// Index into a non-empty `selection` previously returned by `select`.
    fn next_index(&self, selection: &[Endpoint]) -> usize;

    fn name(&self) -> &'static str;

    fn description(&self) -> String;

    fn comparison_metric_name(&self) -> &'static str;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StrategyError {
    #[error("candidate {0} has an invalid comparison metric")]
    InvalidMetric(String),
}
