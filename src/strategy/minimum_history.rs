// src/strategy/minimum_history.rs
use super::{Strategy, StrategyError};
use crate::locator::Endpoint;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Admits endpoints with enough history on the comparison metric and ranks
/// them by it, lowest first.
///
/// `next_index` always picks the best-ranked endpoint; when several endpoints
/// share the best value the pick rotates among them.
#[derive(Debug)]
pub struct MinimumHistoryStrategy {
    min_samples: u64,
    best_k: Option<usize>,
    tie_cursor: AtomicUsize,
}

impl MinimumHistoryStrategy {
    pub fn new(min_samples: u64, best_k: Option<usize>) -> Self {
        Self {
            min_samples,
            best_k,
            tie_cursor: AtomicUsize::new(0),
        }
    }

    fn metric(endpoint: &Endpoint) -> Option<f64> {
        endpoint.history.value
    }
}

impl Strategy for MinimumHistoryStrategy {
    fn select(&self, candidates: &[Endpoint]) -> Result<Vec<Endpoint>, StrategyError> {
        let mut admitted = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if !candidate.healthy || candidate.history.samples < self.min_samples {
                continue;
            }
            match Self::metric(candidate) {
                Some(value) if value.is_finite() && value >= 0.0 => admitted.push(candidate.clone()),
                Some(_) => return Err(StrategyError::InvalidMetric(candidate.backend())),
                None => {}
            }
        }

        // Stable sort keeps discovery order among equal values.
        admitted.sort_by(|a, b| {
            let a = Self::metric(a).unwrap_or(f64::MAX);
            let b = Self::metric(b).unwrap_or(f64::MAX);
            a.total_cmp(&b)
        });

        if let Some(k) = self.best_k {
            admitted.truncate(k);
        }

        Ok(admitted)
    }

    fn next_index(&self, selection: &[Endpoint]) -> usize {
        let best = match selection.first().and_then(Self::metric) {
            Some(best) => best,
            None => return 0,
        };

        let ties = selection
            .iter()
            .take_while(|e| Self::metric(e) == Some(best))
            .count();

        if ties <= 1 {
            return 0;
        }
        self.tie_cursor.fetch_add(1, Ordering::Relaxed) % ties
    }

    fn name(&self) -> &'static str {
        "minimum-history"
    }

    fn description(&self) -> String {
        match self.best_k {
            Some(k) => format!(
                "Selects up to {} endpoints with at least {} samples, preferring the lowest response time",
                k, self.min_samples
            ),
            None => format!(
                "Selects endpoints with at least {} samples, preferring the lowest response time",
                self.min_samples
            ),
        }
    }

    fn comparison_metric_name(&self) -> &'static str {
        "response_time_ms"
    }
}
