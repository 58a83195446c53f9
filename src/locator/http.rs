// src/locator/http.rs
use super::{Endpoint, Locator, LocatorError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches the backend list from a discovery service that answers with a
/// JSON array of endpoint URLs.
pub struct HttpLocator {
    url: String,
    client: Client,
}

impl HttpLocator {
    pub fn new(url: String, timeout: Duration) -> Result<Self, LocatorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Locator for HttpLocator {
    async fn discover(&self) -> Result<Vec<Endpoint>, LocatorError> {
        let urls: Vec<String> = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Discovery at {} returned {} endpoints", self.url, urls.len());

        urls.iter()
            .map(|url| Endpoint::parse(url).map_err(LocatorError::from))
            .collect()
    }

    fn name(&self) -> &str {
        "http"
    }
}
