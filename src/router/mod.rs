// src/router/mod.rs
mod refresh;
mod state;
mod status;

pub use refresh::{Entry, RefreshGate, Waiter, WriterTurn};
pub use state::{same_selection, RewriteRule, RouterState};
pub use status::Status;

use crate::affinity::AffinityProvider;
use crate::config::Config;
use crate::locator::{create_locators, Endpoint};
use crate::metrics::MetricsCollector;
use crate::selector::{SelectionResult, Selector};
use crate::strategy::create_strategy;
use anyhow::{ensure, Context, Result};
use arc_swap::ArcSwap;
use state::Transition;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// How a call to [`Router::refresh`] took part in a selection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This caller ran the selection.
    Performed,
    /// Another refresh was in flight; this caller waited for it.
    Joined,
}

/// Owns the selection state and keeps it current.
///
/// Selection passes are serialised through a [`RefreshGate`]; the resulting
/// [`RouterState`] is published atomically so request handlers always read a
/// consistent `(result, rule)` pair.
pub struct Router {
    selector: Selector,
    affinity: AffinityProvider,
    state: ArcSwap<RouterState>,
    gate: RefreshGate,
    interval: Duration,
    metrics: Arc<MetricsCollector>,
    rule_installs: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl Router {
    pub fn new(
        selector: Selector,
        affinity: AffinityProvider,
        interval: Duration,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            selector,
            affinity,
            state: ArcSwap::from_pointee(RouterState::default()),
            gate: RefreshGate::new(),
            interval,
            metrics,
            rule_installs: AtomicU64::new(0),
            shutdown_tx,
        }
    }

    /// Build a router from configuration and run the first selection.
    pub async fn from_config(config: &Config, metrics: Arc<MetricsCollector>) -> Result<Arc<Self>> {
        config.validate().context("Invalid configuration")?;
        let locators = create_locators(&config.locators).context("Failed to create locators")?;
        let selector = Selector::new(locators, create_strategy(&config.strategy));
        let affinity = AffinityProvider::new(config.affinity.options.clone(), config.affinity.ttl());

        let router = Arc::new(Self::new(
            selector,
            affinity,
            config.refresh_interval(),
            metrics,
        ));
        router.refresh().await;
        Ok(router)
    }

    pub fn affinity(&self) -> &AffinityProvider {
        &self.affinity
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current state; cheap, never blocks on a refresh.
    pub fn snapshot(&self) -> Arc<RouterState> {
        self.state.load_full()
    }

    /// Number of times a new rewrite rule has been installed.
    pub fn rule_installations(&self) -> u64 {
        self.rule_installs.load(Ordering::Relaxed)
    }

    /// Run a selection pass, or wait for the one already running.
    ///
    /// Returns only after a pass that started no earlier than this call has
    /// completed.
    pub async fn refresh(&self) -> RefreshOutcome {
        match self.gate.enter() {
            Entry::Writer(_turn) => {
                debug!("Got selection turn; performing selection");
                let result = self.selector.select().await;
                self.apply(result);
                debug!("Returning selection turn");
                RefreshOutcome::Performed
            }
            Entry::Waiter(waiter) => {
                debug!("Selection is already in progress; awaiting result");
                waiter.wait().await;
                RefreshOutcome::Joined
            }
        }
    }

    fn apply(&self, result: SelectionResult) {
        let admitted = result.selection.len();
        let failed = result.error.is_some();

        match (admitted, &result.error) {
            (0, Some(e)) => error!("Selector returned no valid selection, and error: {}", e),
            (0, None) => warn!("Selector returned no valid selection"),
            (_, Some(e)) => warn!("Selection completed with errors: {}", e),
            (_, None) => debug!("Selected targets: {}", describe(&result.selection)),
        }

        // Only the writer stores, so load-then-store cannot lose an update.
        let current = self.state.load_full();
        match current.transition(result, self.selector.strategy()) {
            Transition::Install(next) => {
                info!(
                    "New targets differ from current selection [{}]; installing rewrite rule => [{}]",
                    describe(current.selection()),
                    describe(next.selection())
                );
                self.rule_installs.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_rule_install();
                self.state.store(Arc::new(next));
            }
            Transition::Replace(next) => {
                if next.rule.is_some() {
                    debug!("Selection is unchanged: [{}]", describe(next.selection()));
                } else {
                    info!("No backends available; cleared rewrite rule");
                }
                self.state.store(Arc::new(next));
            }
            Transition::Keep => {
                warn!(
                    "Keeping last known selection [{}]",
                    describe(current.selection())
                );
            }
        }

        self.metrics.record_selection(admitted, failed);

        let state = self.state.load();
        let pruned = self.affinity.prune(state.rule.as_deref());
        if pruned > 0 {
            debug!("Pruned {} affinity bindings", pruned);
        }
    }

    /// Spawn the periodic refresh loop. It runs until [`Router::shutdown`].
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>> {
        ensure!(
            !self.interval.is_zero(),
            "refresh interval must be greater than zero"
        );

        let router = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        Ok(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + router.interval, router.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                "Starting selection refresh loop with interval: {:?}",
                router.interval
            );

            while !*shutdown_rx.borrow() {
                tokio::select! {
                    _ = ticker.tick() => {
                        router.refresh().await;
                        debug!("Backend selection is sleeping for {:?}", router.interval);
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Selection refresh loop shutting down");
        }))
    }

    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn status(&self) -> Status {
        let state = self.snapshot();
        let strategy = self.selector.strategy();

        let (candidates, endpoints, error, refreshed_at) = match &state.result {
            Some(result) => (
                result.candidates.clone(),
                result.selection.clone(),
                result.error.as_ref().map(ToString::to_string),
                Some(result.refreshed_at.to_rfc3339()),
            ),
            None => (Vec::new(), Vec::new(), None, None),
        };

        Status {
            candidates,
            endpoints,
            strategy: strategy.name().to_string(),
            strategy_description: strategy.description(),
            comparison_metric: strategy.comparison_metric_name().to_string(),
            affinity_options: self
                .affinity
                .options()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            interval_secs: self.interval.as_secs_f64(),
            error,
            refreshed_at,
            rule_installations: self.rule_installations(),
            bindings: self.affinity.binding_count(),
        }
    }
}

fn describe(endpoints: &[Endpoint]) -> String {
    endpoints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
