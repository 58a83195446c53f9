// src/locator/endpoint.rs
use hyper::Uri;
use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// Comparison data a strategy ranks endpoints by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricHistory {
    /// Number of observations behind `value`.
    pub samples: u64,
    /// Current value of the comparison metric, lower is better.
    pub value: Option<f64>,
}

impl MetricHistory {
    pub fn new(samples: u64, value: f64) -> Self {
        Self {
            samples,
            value: Some(value),
        }
    }
}

/// A backend target discovered by a locator.
///
/// Two endpoints are equal when their scheme and authority match; health and
/// history are data carried along for the strategy and take no part in it.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    scheme: String,
    authority: String,
    pub healthy: bool,
    pub history: MetricHistory,
}

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid endpoint url '{url}': {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("endpoint url '{0}' has no host")]
    MissingHost(String),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, EndpointError> {
        let url = Url::parse(raw).map_err(|source| EndpointError::Parse {
            url: raw.to_string(),
            source,
        })?;
        Self::from_url(&url).ok_or_else(|| EndpointError::MissingHost(raw.to_string()))
    }

    pub fn from_url(url: &Url) -> Option<Self> {
        let host = url.host_str()?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Some(Self {
            scheme: url.scheme().to_string(),
            authority,
            healthy: true,
            history: MetricHistory::default(),
        })
    }

    pub fn with_history(mut self, history: MetricHistory) -> Self {
        self.history = history;
        self
    }

    pub fn with_health(mut self, healthy: bool) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// `scheme://authority`, used as the backend label in logs and metrics.
    pub fn backend(&self) -> String {
        format!("{}://{}", self.scheme, self.authority)
    }

    /// Point `uri` at this endpoint, keeping its path and query.
    pub fn rewrite(&self, uri: &Uri) -> Result<Uri, hyper::http::Error> {
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Uri::builder()
            .scheme(self.scheme.as_str())
            .authority(self.authority.as_str())
            .path_and_query(path_and_query)
            .build()
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme && self.authority == other.authority
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.scheme.hash(state);
        self.authority.hash(state);
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)
    }
}
