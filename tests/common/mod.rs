// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use dynamic_router::affinity::{AffinityOption, AffinityProvider};
use dynamic_router::config::RetryConfig;
use dynamic_router::locator::{Endpoint, Locator, LocatorError, MetricHistory};
use dynamic_router::metrics::MetricsRegistry;
use dynamic_router::proxy::{Proxy, Transport, TransportError};
use dynamic_router::retry::RetryStrategy;
use dynamic_router::router::Router;
use dynamic_router::selector::Selector;
use dynamic_router::strategy::Strategy;
use hyper::{Body, Request, Response};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn endpoint(url: &str) -> Endpoint {
    Endpoint::parse(url).unwrap()
}

pub fn endpoint_with_history(url: &str, value: f64, samples: u64) -> Endpoint {
    endpoint(url).with_history(MetricHistory::new(samples, value))
}

/// Pauses `discover` until released, so tests can pile up refresh triggers.
#[derive(Default)]
pub struct Hold {
    pub entered: Notify,
    pub release: Notify,
}

/// Locator whose answer the test controls.
pub struct TestLocator {
    response: Mutex<Result<Vec<Endpoint>, String>>,
    calls: AtomicUsize,
    hold: Option<Arc<Hold>>,
}

impl TestLocator {
    pub fn new(endpoints: Vec<Endpoint>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(endpoints)),
            calls: AtomicUsize::new(0),
            hold: None,
        })
    }

    pub fn holding(endpoints: Vec<Endpoint>, hold: Arc<Hold>) -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Ok(endpoints)),
            calls: AtomicUsize::new(0),
            hold: Some(hold),
        })
    }

    pub fn set(&self, endpoints: Vec<Endpoint>) {
        *self.response.lock().unwrap() = Ok(endpoints);
    }

    pub fn fail(&self, message: &str) {
        *self.response.lock().unwrap() = Err(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Locator for TestLocator {
    async fn discover(&self) -> Result<Vec<Endpoint>, LocatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(hold) = &self.hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }

        let response = self.response.lock().unwrap().clone();
        response.map_err(LocatorError::Unavailable)
    }

    fn name(&self) -> &str {
        "test"
    }
}

pub fn router(
    locator: Arc<TestLocator>,
    strategy: Arc<dyn Strategy>,
    options: Vec<AffinityOption>,
    interval: Duration,
) -> Arc<Router> {
    let metrics = MetricsRegistry::new().unwrap().collector();
    let locators: Vec<Arc<dyn Locator>> = vec![locator];

    Arc::new(Router::new(
        Selector::new(locators, strategy),
        AffinityProvider::new(options, None),
        interval,
        metrics,
    ))
}

pub fn proxy(router: Arc<Router>, transport: Arc<dyn Transport>) -> Proxy {
    Proxy::new(
        router,
        transport,
        RetryStrategy::new(RetryConfig {
            max_attempts: 2,
            backoff_base_ms: 0,
            backoff_max_ms: 0,
        }),
    )
}

pub fn request(path: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::get(path).header("host", "router.local");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub uri: String,
    pub authority: String,
    pub host_header: Option<String>,
}

/// Answers every request with a fixed status and records where it was sent.
pub struct RecordingTransport {
    status: u16,
    requests: Mutex<Vec<Recorded>>,
}

impl RecordingTransport {
    pub fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn authorities(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.authority).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn round_trip(&self, req: Request<Body>) -> Result<Response<Body>, TransportError> {
        self.requests.lock().unwrap().push(Recorded {
            uri: req.uri().to_string(),
            authority: req
                .uri()
                .authority()
                .map(|a| a.to_string())
                .unwrap_or_default(),
            host_header: req
                .headers()
                .get("host")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });

        let mut response = Response::new(Body::from("ok"));
        *response.status_mut() = hyper::StatusCode::from_u16(self.status).unwrap();
        Ok(response)
    }
}

/// Fails with a network error a fixed number of times, then succeeds.
pub struct FlakyTransport {
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyTransport {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FlakyTransport {
    async fn round_trip(&self, _req: Request<Body>) -> Result<Response<Body>, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(TransportError::Network("connection refused".to_string()));
        }
        Ok(Response::new(Body::from("ok")))
    }
}
