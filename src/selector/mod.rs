// src/selector/mod.rs
use crate::locator::{Endpoint, Locator};
use crate::strategy::Strategy;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error};

/// Outcome of one selection pass.
#[derive(Debug, Clone)]
pub struct SelectionResult {
    /// Everything the locators discovered, deduplicated.
    pub candidates: Vec<Endpoint>,
    /// The subset the strategy admitted.
    pub selection: Vec<Endpoint>,
    pub error: Option<SelectionError>,
    pub refreshed_at: DateTime<Utc>,
}

impl SelectionResult {
    pub fn new(candidates: Vec<Endpoint>, selection: Vec<Endpoint>) -> Self {
        Self {
            candidates,
            selection,
            error: None,
            refreshed_at: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: SelectionError) -> Self {
        self.error = Some(error);
        self
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectionError {
    #[error("discovery failed: {}", .0.join("; "))]
    Discovery(Vec<String>),

    #[error("strategy {strategy} failed: {message}")]
    Strategy { strategy: String, message: String },

    /// Some locators failed and the strategy then rejected what remained.
    #[error("discovery failed: {}; strategy {strategy} failed: {message}", .discovery.join("; "))]
    DiscoveryAndStrategy {
        discovery: Vec<String>,
        strategy: String,
        message: String,
    },
}

pub struct Selector {
    locators: Vec<Arc<dyn Locator>>,
    strategy: Arc<dyn Strategy>,
}

impl Selector {
    pub fn new(locators: Vec<Arc<dyn Locator>>, strategy: Arc<dyn Strategy>) -> Self {
        Self { locators, strategy }
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    /// Query every locator, merge the candidates and run the strategy.
    pub async fn select(&self) -> SelectionResult {
        let discovered =
            futures::future::join_all(self.locators.iter().map(|locator| locator.discover()))
                .await;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut failures = Vec::new();

        for (locator, result) in self.locators.iter().zip(discovered) {
            match result {
                Ok(endpoints) => {
                    debug!("Locator {} found {} endpoints", locator.name(), endpoints.len());
                    for endpoint in endpoints {
                        if seen.insert(endpoint.clone()) {
                            candidates.push(endpoint);
                        }
                    }
                }
                Err(e) => {
                    error!("Locator {} failed: {}", locator.name(), e);
                    failures.push(format!("{}: {}", locator.name(), e));
                }
            }
        }

        match self.strategy.select(&candidates) {
            Ok(selection) if failures.is_empty() => SelectionResult::new(candidates, selection),
            Ok(selection) => SelectionResult::new(candidates, selection)
                .with_error(SelectionError::Discovery(failures)),
            Err(e) => {
                let strategy = self.strategy.name().to_string();
                let message = e.to_string();
                error!("Strategy {} rejected the candidates: {}", strategy, message);

                let error = if failures.is_empty() {
                    SelectionError::Strategy { strategy, message }
                } else {
                    SelectionError::DiscoveryAndStrategy {
                        discovery: failures,
                        strategy,
                        message,
                    }
                };
                SelectionResult::new(candidates, Vec::new()).with_error(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{LocatorError, StaticLocator};
    use crate::strategy::{MinimumHistoryStrategy, RandomStrategy};
    use async_trait::async_trait;

    struct FailingLocator;

    #[async_trait]
    impl Locator for FailingLocator {
        async fn discover(&self) -> Result<Vec<Endpoint>, LocatorError> {
            Err(LocatorError::Unavailable("orchestrator api down".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn static_locator(urls: &[&str]) -> Arc<dyn Locator> {
        Arc::new(StaticLocator::from_urls(urls).unwrap())
    }

    #[tokio::test]
    async fn test_merges_and_deduplicates_locators() {
        let selector = Selector::new(
            vec![
                static_locator(&["http://a:1", "http://b:1"]),
                static_locator(&["http://b:1", "http://c:1"]),
            ],
            Arc::new(RandomStrategy::new()),
        );

        let result = selector.select().await;
        let hosts: Vec<&str> = result.candidates.iter().map(|e| e.authority()).collect();
        assert_eq!(hosts, vec!["a:1", "b:1", "c:1"]);
        assert_eq!(result.selection.len(), 3);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_zero_candidates_is_not_an_error() {
        let selector = Selector::new(vec![static_locator(&[])], Arc::new(RandomStrategy::new()));

        let result = selector.select().await;
        assert!(result.selection.is_empty());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_partial_discovery_failure_keeps_other_candidates() {
        let selector = Selector::new(
            vec![static_locator(&["http://a:1"]), Arc::new(FailingLocator)],
            Arc::new(RandomStrategy::new()),
        );

        let result = selector.select().await;
        assert_eq!(result.selection.len(), 1);
        assert!(matches!(result.error, Some(SelectionError::Discovery(ref f)) if f.len() == 1));
    }

    #[tokio::test]
    async fn test_strategy_failure_yields_empty_selection() {
        let bad = Endpoint::parse("http://a:1")
            .unwrap()
            .with_history(crate::locator::MetricHistory::new(10, f64::INFINITY));
        let selector = Selector::new(
            vec![Arc::new(StaticLocator::new(vec![bad]))],
            Arc::new(MinimumHistoryStrategy::new(1, None)),
        );

        let result = selector.select().await;
        assert_eq!(result.candidates.len(), 1);
        assert!(result.selection.is_empty());
        assert!(matches!(result.error, Some(SelectionError::Strategy { .. })));
    }

    #[tokio::test]
    async fn test_strategy_failure_keeps_discovery_failures() {
        let bad = Endpoint::parse("http://a:1")
            .unwrap()
            .with_history(crate::locator::MetricHistory::new(10, f64::NAN));
        let selector = Selector::new(
            vec![Arc::new(StaticLocator::new(vec![bad])), Arc::new(FailingLocator)],
            Arc::new(MinimumHistoryStrategy::new(1, None)),
        );

        let result = selector.select().await;
        assert!(result.selection.is_empty());
        match &result.error {
            Some(SelectionError::DiscoveryAndStrategy { discovery, strategy, .. }) => {
                assert_eq!(discovery.len(), 1);
                assert_eq!(strategy, "minimum-history");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let rendered = result.error.unwrap().to_string();
        assert!(rendered.contains("orchestrator api down"));
        assert!(rendered.contains("minimum-history"));
    }
}
