// src/locator/mod.rs
mod endpoint;
mod http;
mod probe;
mod static_list;

pub use endpoint::{Endpoint, EndpointError, MetricHistory};
pub use http::HttpLocator;
pub use probe::ProbeLocator;
pub use static_list::StaticLocator;

use crate::config::LocatorConfig;
use async_trait::async_trait;
use std::sync::Arc;

/// Source of candidate backends.
///
/// Only the refresh writer calls `discover`, so implementations never see
/// concurrent calls from the router.
#[async_trait]
pub trait Locator: Send + Sync {
    async fn discover(&self) -> Result<Vec<Endpoint>, LocatorError>;

    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum LocatorError {
    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),

    #[error("discovery source unavailable: {0}")]
    Unavailable(String),
}

pub fn create_locators(configs: &[LocatorConfig]) -> Result<Vec<Arc<dyn Locator>>, LocatorError> {
    configs
        .iter()
        .map(|config| -> Result<Arc<dyn Locator>, LocatorError> {
            match config {
                LocatorConfig::Static { endpoints } => {
                    Ok(Arc::new(StaticLocator::from_urls(endpoints)?))
                }
                LocatorConfig::Probe(probe) => Ok(Arc::new(ProbeLocator::new(probe)?)),
                LocatorConfig::Http { url, timeout_ms } => Ok(Arc::new(HttpLocator::new(
                    url.clone(),
                    std::time::Duration::from_millis(*timeout_ms),
                )?)),
            }
        })
        .collect()
}
