// src/lib.rs
pub mod affinity;
pub mod config;
pub mod locator;
pub mod metrics;
pub mod proxy;
pub mod retry;
pub mod router;
pub mod selector;
pub mod server;
pub mod strategy;
