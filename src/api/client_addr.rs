//! Caller address resolution for the localhost-only endpoints

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use super::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Where a request came from
///
/// `resolved` is the first `X-Forwarded-For` hop when forwarding is trusted
/// and the header is present, otherwise the TCP peer. Trusting the header is
/// only sound behind a proxy that overwrites it; see
/// [`ServerConfig::trust_forwarded_for`](crate::config::ServerConfig::trust_forwarded_for).
#[derive(Debug, Clone, Default)]
pub struct ClientAddr {
    pub peer: Option<IpAddr>,
    pub forwarded_for: Option<String>,
    pub resolved: Option<String>,
}

impl ClientAddr {
    pub fn resolve(peer: Option<IpAddr>, forwarded_for: Option<String>, trust_forwarded: bool) -> Self {
        let first_hop = forwarded_for
            .as_deref()
            .filter(|_| trust_forwarded)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .map(str::to_string);

        let resolved = first_hop.or_else(|| peer.map(|ip| ip.to_string()));

        Self {
            peer,
            forwarded_for,
            resolved,
        }
    }

    /// Loopback callers only; an unresolvable caller never qualifies
    pub fn is_loopback(&self) -> bool {
        self.resolved.as_deref().is_some_and(is_loopback_host)
    }

    /// Peer address for logging
    pub fn client_host(&self) -> String {
        self.peer
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let forwarded_for = parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(Self::resolve(peer, forwarded_for, state.trust_forwarded_for))
    }
}

/// `127.0.0.0/8`, `::1`, IPv4-mapped loopback, or `localhost`
pub fn is_loopback_host(host: &str) -> bool {
    let host = host.trim();

    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let ip = host
        .parse::<IpAddr>()
        .ok()
        .or_else(|| host.parse::<SocketAddr>().ok().map(|addr| addr.ip()));

    match ip {
        Some(IpAddr::V4(v4)) => v4.is_loopback(),
        Some(IpAddr::V6(v6)) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
        None => false,
    }
}
