// src/proxy/transport.rs
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response};
use hyper_tls::HttpsConnector;
use std::error::Error as StdError;
use std::time::Duration;

/// Performs a single roundtrip to a backend. Retrying is the caller's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Connection-level failures worth another attempt.
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_) | TransportError::Timeout(_))
    }

    fn from_hyper(err: hyper::Error) -> Self {
        if err.is_connect() || err.is_closed() || err.is_incomplete_message() || has_io_source(&err)
        {
            TransportError::Network(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

fn has_io_source(err: &(dyn StdError + 'static)) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<std::io::Error>() {
            return true;
        }
        source = cause.source();
    }
    false
}

/// hyper client over plain TCP or TLS, with a per-attempt deadline.
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    timeout: Duration,
}

impl HyperTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder().build::<_, Body>(HttpsConnector::new());
        Self { client, timeout }
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError> {
        match tokio::time::timeout(self.timeout, self.client.request(req)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(TransportError::from_hyper(e)),
            Err(_) => Err(TransportError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HyperTransport::new(Duration::from_secs(2));
        let req = Request::get(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();

        let err = transport.round_trip(req).await.unwrap_err();
        assert!(err.is_network(), "unexpected error {:?}", err);
    }

    #[tokio::test]
    async fn test_roundtrip_against_live_backend() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v1/query")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let transport = HyperTransport::new(Duration::from_secs(2));
        let req = Request::get(format!("{}/api/v1/query", server.url()))
            .body(Body::empty())
            .unwrap();

        // Application errors come back as responses, not transport errors.
        let response = transport.round_trip(req).await.unwrap();
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn test_request_errors_are_not_network_errors() {
        assert!(!TransportError::Request("bad uri".into()).is_network());
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_network());
    }
}
