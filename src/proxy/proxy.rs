// ────────────────────────────────
// src/proxy/proxy.rs
// Per-request dispatch: affinity, rewrite, forward with retry
// ────────────────────────────────

use super::transport::{Transport, TransportError};
use crate::metrics::Timer;
use crate::retry::{RetryDecision, RetryStrategy};
use crate::router::Router;
use hyper::body::{Bytes, HttpBody};
use hyper::header::{self, HeaderMap};
use hyper::http::request::Parts;
use hyper::{Body, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Upper bound on a buffered request body unless configured otherwise.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct Proxy {
    router: Arc<Router>,
    transport: Arc<dyn Transport>,
    retry: RetryStrategy,
    max_body_bytes: usize,
}

impl Proxy {
    pub fn new(router: Arc<Router>, transport: Arc<dyn Transport>, retry: RetryStrategy) -> Self {
        Self {
            router,
            transport,
            retry,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Requests with larger bodies are refused with 413.
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub async fn handle(
        &self,
        req: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError> {
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "request",
            %request_id,
            method = %req.method(),
            path = %req.uri().path()
        );

        async move {
            let timer = Timer::new();
            let method = req.method().clone();

            let result = self.dispatch(req, peer).await;

            let status = match &result {
                Ok(response) => response.status(),
                Err(e) => e.status_code(),
            };
            self.router
                .metrics()
                .record_request(method.as_str(), status.as_u16(), timer.elapsed());

            result
        }
        .instrument(span)
        .await
    }

    async fn dispatch(
        &self,
        req: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError> {
        // One snapshot per request; the rule and selection always match.
        let state = self.router.snapshot();
        let rule = state.rule.as_ref().ok_or(ProxyError::NoUsableBackends)?;

        let affinity = self.router.affinity();
        let client_key = affinity.client_key(&req, peer);
        let resolution = affinity.resolve(client_key.as_deref(), rule);
        self.router
            .metrics()
            .record_affinity(resolution.outcome.as_str());

        let target = &resolution.endpoint;
        let backend = target.backend();
        debug!("Routing to {} (affinity {})", backend, resolution.outcome.as_str());

        let (mut parts, body) = req.into_parts();
        parts.uri = target
            .rewrite(&parts.uri)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(header::HOST);

        // Buffered so the request can be replayed on retry.
        let body = read_body(&parts.headers, body, self.max_body_bytes).await?;

        let transport = &self.transport;
        let parts = &parts;
        let body = &body;
        let timer = Timer::new();

        let result = self
            .retry
            .run(
                move || transport.round_trip(build_request(parts, body)),
                |e: &TransportError| {
                    if e.is_network() {
                        RetryDecision::Retry
                    } else {
                        RetryDecision::NoRetry
                    }
                },
            )
            .await;

        let metrics = self.router.metrics();
        match result {
            Ok(response) => {
                let success = !response.status().is_server_error();
                metrics.record_backend_request(&backend, success, timer.elapsed());
                // The backend answered, so the client may stick to it.
                if let Some(key) = client_key.as_deref() {
                    affinity.commit(key, &resolution);
                }
                Ok(response)
            }
            Err(source) => {
                warn!("Forwarding to {} failed: {}", backend, source);
                metrics.record_backend_request(&backend, false, timer.elapsed());
                Err(ProxyError::Upstream { backend, source })
            }
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

async fn read_body(headers: &HeaderMap, mut body: Body, limit: usize) -> Result<Bytes, ProxyError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.map_or(false, |len| len > limit as u64) {
        return Err(ProxyError::PayloadTooLarge { limit });
    }

    let mut buffer = Vec::with_capacity(declared.unwrap_or(0) as usize);
    while let Some(chunk) = body.data().await {
        let chunk =
            chunk.map_err(|e| ProxyError::InvalidRequest(format!("failed to read body: {}", e)))?;
        if buffer.len() + chunk.len() > limit {
            return Err(ProxyError::PayloadTooLarge { limit });
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buffer))
}

fn build_request(parts: &Parts, body: &Bytes) -> Request<Body> {
    let mut req = Request::new(Body::from(body.clone()));
    *req.method_mut() = parts.method.clone();
    *req.uri_mut() = parts.uri.clone();
    *req.headers_mut() = parts.headers.clone();
    req
}

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No backend available")]
    NoUsableBackends,

    #[error("Backend {backend} failed: {source}")]
    Upstream {
        backend: String,
        #[source]
        source: TransportError,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NoUsableBackends => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Upstream {
                source: TransportError::Timeout(_),
                ..
            } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

// Convert ProxyError to Hyper Response for error handling
impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let status = err.status_code();
        let message = match err {
            ProxyError::NoUsableBackends => "No backend available",
            ProxyError::Upstream { .. } if status == StatusCode::GATEWAY_TIMEOUT => "Gateway timeout",
            ProxyError::Upstream { .. } => "Bad gateway",
            ProxyError::InvalidRequest(_) => "Bad request",
            ProxyError::PayloadTooLarge { .. } => "Payload too large",
        };

        let mut response = Response::new(Body::from(message));
        *response.status_mut() = status;
        response
    }
}
