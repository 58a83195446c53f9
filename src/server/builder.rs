// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use tower::Service;

/// Builder pattern so `main.rs` can inject its handler factory.
pub struct ServerBuilder<F> {
    addr: SocketAddr,
    make_handler: Option<F>,
}

impl<F, H> ServerBuilder<F>
where
    F: Fn(SocketAddr) -> H,
    H: Service<Request<Body>, Response = Response<Body>> + Send + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            make_handler: None,
        }
    }

    /// Factory building one handler per accepted connection from its peer
    /// address.
    pub fn with_handler(mut self, make_handler: F) -> Self {
        self.make_handler = Some(make_handler);
        self
    }

    /// Boot the TCP listener and spawn one task per connection until
    /// `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let make_handler = self
            .make_handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;

        let listener = bind_tcp(self.addr).await?;
        tracing::info!("HTTP server listening on {}", self.addr);

        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    tracing::info!("HTTP server on {} stopped accepting connections", self.addr);
                    return Ok(());
                }
            };
            let svc = make_handler(peer);

            tokio::spawn(async move {
                let http = Http::new();
                if let Err(err) = http.serve_connection(stream, svc).await {
                    tracing::warn!(%peer, %err, "connection error");
                }
            });
        }
    }
}
