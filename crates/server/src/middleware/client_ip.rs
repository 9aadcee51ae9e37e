//! Client IP extraction for Cloudflare and reverse proxies.
//!
//! Checks Cloudflare's `CF-Connecting-IP` header first, then the standard proxy
//! headers, then the socket peer address.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;

/// The address an order was placed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Client IP announced by a proxy header, if any.
#[must_use]
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    // Try CF-Connecting-IP first (Cloudflare's real client IP)
    if let Some(ip) = headers
        .get("cf-connecting-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    // Try X-Forwarded-For (first IP in the chain)
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
    {
        return Some(ip);
    }

    // Try X-Real-IP
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_ip(&parts.headers) {
            return Ok(Self(ip));
        }

        match ConnectInfo::<SocketAddr>::from_request_parts(parts, state).await {
            Ok(ConnectInfo(peer)) => Ok(Self(peer.ip())),
            Err(_) => {
                tracing::debug!("No client address available");
                Ok(Self(IpAddr::V4(Ipv4Addr::UNSPECIFIED)))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let map = headers(&[
            ("x-forwarded-for", "198.51.100.1"),
            ("cf-connecting-ip", "203.0.113.9"),
        ]);
        assert_eq!(forwarded_ip(&map), Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_first_forwarded_hop() {
        let map = headers(&[("x-forwarded-for", "198.51.100.1, 10.0.0.1")]);
        assert_eq!(forwarded_ip(&map), Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn test_real_ip_and_garbage() {
        let map = headers(&[("x-forwarded-for", "unknown"), ("x-real-ip", "2001:db8::1")]);
        assert_eq!(forwarded_ip(&map), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_falls_back_to_peer_address() {
        let (mut parts, ()) = axum::http::Request::builder()
            .extension(ConnectInfo("192.0.2.7:41000".parse::<SocketAddr>().unwrap()))
            .body(())
            .unwrap()
            .into_parts();

        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, "192.0.2.7".parse::<IpAddr>().unwrap());
    }
}
