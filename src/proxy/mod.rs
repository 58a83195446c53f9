// src/proxy/mod.rs
mod proxy;
mod transport;

pub use proxy::{Proxy, ProxyError, DEFAULT_MAX_BODY_BYTES};
pub use transport::{HyperTransport, Transport, TransportError};
