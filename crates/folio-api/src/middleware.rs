use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, UserAgent, authorization::Bearer};
use chrono::Utc;

use crate::auth::verify_token;
use crate::error::ApiError;
use crate::notify::BOT_SECRET_HEADER;
use crate::state::AppState;

/// Validate the admin bearer token and stash its claims in the request
/// extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))?;

    let claims = verify_token(&state.auth.jwt_secret, bearer.token(), Utc::now())
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Shared-secret guard for the bot surface. With no secret configured every
/// request is refused.
pub async fn require_bot(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state.auth.bot_secret.as_deref();
    let provided = req
        .headers()
        .get(BOT_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());

    match (expected, provided) {
        (Some(expected), Some(provided)) if secrets_match(expected, provided) => Ok(next.run(req).await),
        _ => Err(ApiError::unauthorized("Unauthorized bot request")),
    }
}

fn secrets_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Who sent the request, as far as we can tell.
#[derive(Debug, Clone)]
pub struct ClientMeta {
    pub ip: String,
    pub user_agent: String,
}

impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let user_agent = parts
            .headers
            .typed_get::<UserAgent>()
            .map(|ua| ua.as_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            ip: client_ip(&parts.headers, peer, state.trust_proxy),
            user_agent,
        })
    }
}

/// The socket peer, unless the server sits behind a trusted reverse proxy.
/// In that case the right-most `X-Forwarded-For` hop (the one the proxy
/// appended) wins, then `X-Real-IP`. Hops further left are client-supplied.
fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_proxy: bool) -> String {
    let forwarded = || {
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

        header("x-forwarded-for")
            .and_then(|v| v.rsplit(',').next())
            .and_then(|hop| hop.trim().parse::<IpAddr>().ok())
            .or_else(|| header("x-real-ip").and_then(|v| v.trim().parse().ok()))
    };

    trust_proxy
        .then(forwarded)
        .flatten()
        .or(peer)
        .map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(value));
        }
        headers
    }

    fn peer() -> Option<IpAddr> {
        Some("192.0.2.10".parse().unwrap())
    }

    #[test]
    fn forwarding_headers_ignored_by_default() {
        let spoofed = headers(&[("x-forwarded-for", "203.0.113.7"), ("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&spoofed, peer(), false), "192.0.2.10");
        assert_eq!(client_ip(&spoofed, None, false), "unknown");
    }

    #[test]
    fn trusted_proxy_uses_rightmost_hop() {
        let appended = headers(&[("x-forwarded-for", "203.0.113.7, 198.51.100.4")]);
        assert_eq!(client_ip(&appended, peer(), true), "198.51.100.4");

        let real_ip = headers(&[("x-real-ip", " 198.51.100.2 ")]);
        assert_eq!(client_ip(&real_ip, peer(), true), "198.51.100.2");
    }

    #[test]
    fn trusted_proxy_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), peer(), true), "192.0.2.10");

        let garbage = headers(&[("x-forwarded-for", "1.2.3.4, not-an-ip")]);
        assert_eq!(client_ip(&garbage, peer(), true), "192.0.2.10");
    }

    #[test]
    fn secret_comparison() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3creT"));
        assert!(!secrets_match("s3cret", "s3cret!"));
    }
}
