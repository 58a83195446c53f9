// src/server/admin.rs
use crate::config::MetricsConfig;
use crate::metrics::MetricsRegistry;
use crate::router::Router;
use anyhow::{Context, Result};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

const PROMETHEUS_TEXT: &str = "text/plain; version=0.0.4";
const JSON: &str = "application/json";

/// Read-only side channel exposing prometheus metrics and the router status.
pub struct AdminService {
    registry: MetricsRegistry,
    router: Arc<Router>,
    config: MetricsConfig,
}

impl AdminService {
    pub fn new(registry: MetricsRegistry, router: Arc<Router>, config: MetricsConfig) -> Self {
        Self {
            registry,
            router,
            config,
        }
    }

    pub fn respond(&self, req: &Request<Body>) -> Response<Body> {
        if req.method() != Method::GET {
            return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }

        let path = req.uri().path();
        let rendered = if path == self.config.path {
            self.registry.gather().map(|body| (body, PROMETHEUS_TEXT))
        } else if path == self.config.status_path {
            serde_json::to_vec_pretty(&self.router.status())
                .map(|body| (body, JSON))
                .context("Failed to serialize status")
        } else {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        };

        match rendered {
            Ok((body, content_type)) => {
                let mut response = Response::new(Body::from(body));
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
                response
            }
            Err(e) => {
                error!("Failed to render {}: {:#}", path, e);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }

    /// Bind `addr` and serve in the background.
    pub fn spawn(self, addr: SocketAddr) -> Result<JoinHandle<()>> {
        let service = Arc::new(self);
        let make_service = make_service_fn(move |_| {
            let service = service.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let response = service.respond(&req);
                    async move { Ok::<_, Infallible>(response) }
                }))
            }
        });

        let server = Server::try_bind(&addr)
            .with_context(|| format!("Failed to bind admin server on {}", addr))?
            .serve(make_service);

        info!("Admin server listening on http://{}", addr);

        Ok(tokio::spawn(async move {
            if let Err(e) = server.await {
                error!("Admin server error: {}", e);
            }
        }))
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::AffinityProvider;
    use crate::locator::{Endpoint, Locator, StaticLocator};
    use crate::selector::Selector;
    use crate::strategy::RandomStrategy;
    use std::time::Duration;

    async fn admin() -> AdminService {
        let registry = MetricsRegistry::new().unwrap();
        let locator: Arc<dyn Locator> = Arc::new(StaticLocator::new(vec![
            Endpoint::parse("http://a:8080").unwrap(),
        ]));
        let router = Arc::new(Router::new(
            Selector::new(vec![locator], Arc::new(RandomStrategy)),
            AffinityProvider::new(vec![], None),
            Duration::from_secs(10),
            registry.collector(),
        ));
        router.refresh().await;

        AdminService::new(registry, router, MetricsConfig::default())
    }

    fn get(path: &str) -> Request<Body> {
        Request::get(path).body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_status_is_json() {
        let admin = admin().await;

        let response = admin.respond(&get("/status"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], JSON);

        let status: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(status["strategy"], "random");
        assert_eq!(status["endpoints"][0]["authority"], "a:8080");
    }

    #[tokio::test]
    async fn test_metrics_are_exposed() {
        let admin = admin().await;

        let response = admin.respond(&get("/metrics"));
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response)
            .await
            .contains("router_rewrite_rule_installs_total 1"));
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let admin = admin().await;

        assert_eq!(admin.respond(&get("/nope")).status(), StatusCode::NOT_FOUND);

        let post = Request::post("/status").body(Body::empty()).unwrap();
        assert_eq!(admin.respond(&post).status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
