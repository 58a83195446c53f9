// src/affinity/options.rs
use hyper::header::COOKIE;
use hyper::{Body, Request};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Where a client identity is read from.
///
/// Parsed from `header:<name>`, `cookie:<name>` or `source-address`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum AffinityOption {
    Header(String),
    Cookie(String),
    SourceAddress,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid affinity option '{0}': expected header:<name>, cookie:<name> or source-address")]
pub struct ParseAffinityOptionError(String);

impl FromStr for AffinityOption {
    type Err = ParseAffinityOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseAffinityOptionError(s.to_string());

        match s.split_once(':') {
            Some(("header", name)) if !name.is_empty() => {
                hyper::header::HeaderName::from_str(name).map_err(|_| invalid())?;
                Ok(AffinityOption::Header(name.to_string()))
            }
            Some(("cookie", name)) if !name.is_empty() => Ok(AffinityOption::Cookie(name.to_string())),
            None if s == "source-address" => Ok(AffinityOption::SourceAddress),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for AffinityOption {
    type Error = ParseAffinityOptionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AffinityOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AffinityOption::Header(name) => write!(f, "header:{}", name),
            AffinityOption::Cookie(name) => write!(f, "cookie:{}", name),
            AffinityOption::SourceAddress => f.write_str("source-address"),
        }
    }
}

impl AffinityOption {
    /// Client key for `req`, prefixed with the option so values from
    /// different sources never collide.
    pub fn client_key(&self, req: &Request<Body>, peer: Option<SocketAddr>) -> Option<String> {
        let value = match self {
            AffinityOption::Header(name) => req
                .headers()
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            AffinityOption::Cookie(name) => cookie_value(req, name),
            AffinityOption::SourceAddress => peer.map(|addr| addr.ip().to_string()),
        }?;

        if value.is_empty() {
            return None;
        }
        Some(format!("{}={}", self, value))
    }
}

fn cookie_value(req: &Request<Body>, name: &str) -> Option<String> {
    req.headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        assert_eq!(
            "header:X-User".parse::<AffinityOption>().unwrap(),
            AffinityOption::Header("X-User".to_string())
        );
        assert_eq!(
            "cookie:session".parse::<AffinityOption>().unwrap(),
            AffinityOption::Cookie("session".to_string())
        );
        assert_eq!(
            "source-address".parse::<AffinityOption>().unwrap(),
            AffinityOption::SourceAddress
        );
        assert!("header:".parse::<AffinityOption>().is_err());
        assert!("header:bad header".parse::<AffinityOption>().is_err());
        assert!("sticky".parse::<AffinityOption>().is_err());
    }

    #[test]
    fn test_header_and_cookie_keys() {
        let req = Request::builder()
            .uri("/")
            .header("X-User", "alice")
            .header(COOKIE, "theme=dark; session=abc123")
            .body(Body::empty())
            .unwrap();

        let header = AffinityOption::Header("x-user".to_string());
        assert_eq!(header.client_key(&req, None).as_deref(), Some("header:x-user=alice"));

        let cookie = AffinityOption::Cookie("session".to_string());
        assert_eq!(cookie.client_key(&req, None).as_deref(), Some("cookie:session=abc123"));

        let missing = AffinityOption::Cookie("other".to_string());
        assert_eq!(missing.client_key(&req, None), None);
    }

    #[test]
    fn test_source_address_ignores_port() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let option = AffinityOption::SourceAddress;

        let a = option.client_key(&req, Some("10.1.2.3:50000".parse().unwrap()));
        let b = option.client_key(&req, Some("10.1.2.3:50001".parse().unwrap()));
        assert_eq!(a, b);
        assert_eq!(option.client_key(&req, None), None);
    }
}
