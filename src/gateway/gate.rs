//! Request gate
//!
//! Runs in front of every route:
//! 1. IP allow-list (skipped for `/health` and discovery documents)
//! 2. Handshake paths (`/.well-known/*`, `/authorize`, `/token`) pass straight through
//! 3. Per-caller rate limit
//! 4. Shared-secret check, when a secret is configured

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::rate_limit::RateWindow;
use crate::Result;
use crate::config::SecurityConfig;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "x-mcp-secret";

/// Identity used when no address can be determined
pub const UNKNOWN_CALLER: &str = "unknown";

/// Resolved gate settings plus the shared rate window
#[derive(Debug)]
pub struct Gate {
    allowed_ips: Option<HashSet<IpAddr>>,
    rate: Arc<RateWindow>,
    secret: Option<String>,
}

impl Gate {
    /// Build from configuration, sharing `rate` with other holders
    ///
    /// # Errors
    ///
    /// Returns an error if an allow-list entry is not an IP address.
    pub fn from_config(config: &SecurityConfig, rate: Arc<RateWindow>) -> Result<Self> {
        let allowed_ips = if config.enforce_ip_allowlist {
            Some(config.allowed_ip_set()?.into_iter().collect())
        } else {
            None
        };
        Ok(Self {
            allowed_ips,
            rate,
            secret: config.shared_secret().map(ToString::to_string),
        })
    }

    /// Whether the allow-list is enforced
    #[must_use]
    pub fn enforces_allowlist(&self) -> bool {
        self.allowed_ips.is_some()
    }

    /// Whether a shared secret is required
    #[must_use]
    pub fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether `identity` may pass the allow-list
    #[must_use]
    pub fn admits(&self, identity: &str) -> bool {
        let Some(allowed) = &self.allowed_ips else {
            return true;
        };
        if identity == "localhost" {
            return true;
        }
        identity
            .parse::<IpAddr>()
            .map(|ip| ip.to_canonical())
            .is_ok_and(|ip| ip.is_loopback() || allowed.contains(&ip))
    }

    /// Whether the request carries acceptable credentials
    #[must_use]
    pub fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(secret) = &self.secret else {
            return true;
        };

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("Bearer "));
        if bearer {
            return true;
        }

        headers
            .get(SECRET_HEADER)
            .is_some_and(|v| bool::from(v.as_bytes().ct_eq(secret.as_bytes())))
    }
}

/// Caller identity: first `X-Forwarded-For` hop, else the peer address
#[must_use]
pub fn caller_identity(request: &Request<Body>) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| UNKNOWN_CALLER.to_string(), |ConnectInfo(addr)| addr.ip().to_string())
}

/// Discovery documents, at the root or under a vendor prefix
#[must_use]
pub fn is_discovery_path(path: &str) -> bool {
    path.starts_with("/.well-known/") || path.contains("/.well-known/")
}

/// Paths that skip the rate limit and secret check
#[must_use]
pub fn is_handshake_path(path: &str) -> bool {
    is_discovery_path(path) || path == "/authorize" || path == "/token"
}

/// Gate middleware
pub async fn gate_middleware(
    State(gate): State<Arc<Gate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let identity = caller_identity(&request);

    if path != "/health" && !is_discovery_path(&path) && !gate.admits(&identity) {
        warn!(ip = %identity, path = %path, "Caller not on allow-list");
        return forbidden_response(&identity);
    }

    if is_handshake_path(&path) {
        debug!(ip = %identity, path = %path, "Handshake path, skipping rate limit and secret");
        return next.run(request).await;
    }

    if !gate.rate.check(&identity) {
        warn!(ip = %identity, path = %path, "Rate limit exceeded");
        return rate_limited_response(gate.rate.window().as_secs());
    }

    if !gate.authorized(request.headers()) {
        warn!(ip = %identity, path = %path, "Missing or invalid credentials");
        return unauthorized_response();
    }

    debug!(ip = %identity, path = %path, "Request admitted");
    next.run(request).await
}

fn forbidden_response(identity: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        format!("Forbidden - IP {identity} not allowed"),
    )
        .into_response()
}

fn rate_limited_response(retry_after_secs: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after_secs.max(1).to_string())],
        "Rate limit exceeded",
    )
        .into_response()
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        "Unauthorized",
    )
        .into_response()
}
