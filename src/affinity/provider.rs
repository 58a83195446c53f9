// src/affinity/provider.rs
use super::AffinityOption;
use crate::locator::Endpoint;
use crate::router::RewriteRule;
use dashmap::DashMap;
use hyper::{Body, Request};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Binding {
    pub endpoint: Endpoint,
    pub created_at: Instant,
}

impl Binding {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.map_or(false, |ttl| self.created_at.elapsed() >= ttl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffinityOutcome {
    /// No client key could be derived; the rewrite rule decided.
    Unbound,
    /// An existing binding was honoured.
    Hit,
    /// First contact for this client key.
    Miss,
    /// The binding pointed at an endpoint no longer selected, or had expired.
    Stale,
}

impl AffinityOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AffinityOutcome::Unbound => "unbound",
            AffinityOutcome::Hit => "hit",
            AffinityOutcome::Miss => "miss",
            AffinityOutcome::Stale => "stale",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub endpoint: Endpoint,
    pub outcome: AffinityOutcome,
}

impl Resolution {
    pub fn is_new_binding(&self) -> bool {
        matches!(self.outcome, AffinityOutcome::Miss | AffinityOutcome::Stale)
    }
}

/// Keeps clients on the backend they were first sent to for as long as that
/// backend stays selected.
///
/// Stale bindings are replaced on lookup rather than swept, so the provider
/// never has to coordinate with the refresh writer.
pub struct AffinityProvider {
    options: Vec<AffinityOption>,
    ttl: Option<Duration>,
    bindings: DashMap<String, Binding>,
}

impl AffinityProvider {
    pub fn new(options: Vec<AffinityOption>, ttl: Option<Duration>) -> Self {
        Self {
            options,
            ttl,
            bindings: DashMap::new(),
        }
    }

    pub fn options(&self) -> &[AffinityOption] {
        &self.options
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// Client key from the first option that yields one.
    pub fn client_key(&self, req: &Request<Body>, peer: Option<SocketAddr>) -> Option<String> {
        self.options
            .iter()
            .find_map(|option| option.client_key(req, peer))
    }

    /// Pick the endpoint for a request without recording anything.
    ///
    /// A binding that is out of the selection or expired is dropped here; the
    /// replacement is only stored by [`AffinityProvider::commit`].
    pub fn resolve(&self, client_key: Option<&str>, rule: &RewriteRule) -> Resolution {
        let key = match client_key {
            Some(key) => key,
            None => {
                return Resolution {
                    endpoint: rule.resolve().clone(),
                    outcome: AffinityOutcome::Unbound,
                }
            }
        };

        // Clone out of the map before touching it again; holding the guard
        // across `remove` on the same shard would deadlock.
        let existing = self.bindings.get(key).map(|b| b.value().clone());

        let outcome = match existing {
            Some(binding) if self.is_usable(&binding, rule) => {
                return Resolution {
                    endpoint: binding.endpoint,
                    outcome: AffinityOutcome::Hit,
                };
            }
            Some(binding) => {
                debug!("Dropping stale binding {} -> {}", key, binding.endpoint);
                // Only if it is still stale; a concurrent commit may have
                // replaced it already.
                self.bindings
                    .remove_if(key, |_, current| !self.is_usable(current, rule));
                AffinityOutcome::Stale
            }
            None => AffinityOutcome::Miss,
        };

        Resolution {
            endpoint: rule.resolve().clone(),
            outcome,
        }
    }

    /// Record the binding chosen by `resolve` once the request reached it.
    pub fn commit(&self, client_key: &str, resolution: &Resolution) {
        if !resolution.is_new_binding() {
            return;
        }
        self.bindings.insert(
            client_key.to_string(),
            Binding::new(resolution.endpoint.clone()),
        );
        debug!("Bound {} -> {}", client_key, resolution.endpoint);
    }

    /// Drop every binding that could no longer be honoured under `rule`.
    /// Returns how many were removed.
    pub fn prune(&self, rule: Option<&RewriteRule>) -> usize {
        let before = self.bindings.len();
        match rule {
            Some(rule) => self.bindings.retain(|_, binding| self.is_usable(binding, rule)),
            None => self.bindings.clear(),
        }
        before.saturating_sub(self.bindings.len())
    }

    fn is_usable(&self, binding: &Binding, rule: &RewriteRule) -> bool {
        rule.contains(&binding.endpoint) && !binding.is_expired(self.ttl)
    }
}
