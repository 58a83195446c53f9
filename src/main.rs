// src/main.rs
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use dynamic_router::{
    config,
    metrics::MetricsRegistry,
    proxy::{HyperTransport, Proxy},
    retry::RetryStrategy,
    router::Router,
    server::{AdminService, RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dynamic_router=info".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    // Initial selection, then keep it fresh in the background
    let router = Router::from_config(&config, metrics).await?;
    let refresh_loop = router.start()?;

    let proxy = Arc::new(Proxy::new(
        router.clone(),
        Arc::new(HyperTransport::new(config.forward.timeout())),
        RetryStrategy::new(config.retry.clone()),
    )
    .with_max_body_bytes(config.forward.max_body_bytes));

    if config.metrics.enabled {
        let admin_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        AdminService::new(metrics_registry, router.clone(), config.metrics.clone())
            .spawn(admin_addr)?;
    }

    info!("Starting router on {}", config.listen_addr);

    ServerBuilder::new(config.listen_addr)
        .with_handler(move |peer| RequestHandler::new(proxy.clone(), Some(peer)))
        .serve(shutdown_signal())
        .await?;

    router.shutdown();
    if let Err(e) = refresh_loop.await {
        error!("Refresh loop terminated abnormally: {}", e);
    }

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
