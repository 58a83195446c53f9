// src/locator/static_list.rs
use super::{Endpoint, Locator, LocatorError};
use async_trait::async_trait;

/// Fixed list of backends taken from configuration.
#[derive(Debug, Clone)]
pub struct StaticLocator {
    endpoints: Vec<Endpoint>,
}

impl StaticLocator {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self { endpoints }
    }

    pub fn from_urls<S: AsRef<str>>(urls: &[S]) -> Result<Self, LocatorError> {
        let endpoints = urls
            .iter()
            .map(|url| Endpoint::parse(url.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(endpoints))
    }
}

#[async_trait]
impl Locator for StaticLocator {
    async fn discover(&self) -> Result<Vec<Endpoint>, LocatorError> {
        Ok(self.endpoints.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}
