//! Caller identity resolution.
//!
//! The limiter trusts whatever string this returns. Deployments behind a
//! proxy that sets `X-Real-IP` or `X-Forwarded-For` get the client address;
//! otherwise the peer socket address is used.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Identity used when nothing better is available.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Derive the rate limit identity for a request.
pub fn resolve_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = header_str(headers, "x-real-ip") {
        return ip.to_string();
    }

    if let Some(ip) = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:54321".parse().unwrap())
    }

    #[test]
    fn test_real_ip_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.1"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.2"));

        assert_eq!(resolve_identity(&headers, peer()), "203.0.113.1");
    }

    #[test]
    fn test_first_forwarded_for_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 198.51.100.2 , 10.0.0.1"),
        );

        assert_eq!(resolve_identity(&headers, peer()), "198.51.100.2");
    }

    #[test]
    fn test_falls_back_to_peer_ip() {
        assert_eq!(resolve_identity(&HeaderMap::new(), peer()), "192.0.2.10");
    }

    #[test]
    fn test_unknown_without_any_source() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("   "));
        assert_eq!(resolve_identity(&headers, None), UNKNOWN_IDENTITY);
    }
}
