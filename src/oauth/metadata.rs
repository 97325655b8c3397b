//! Authorization server metadata (RFC 8414)

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Discovery document served at `/.well-known/oauth-authorization-server`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    /// Authorization server issuer URL
    pub issuer: String,

    /// Authorization endpoint URL
    pub authorization_endpoint: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Supported response types
    pub response_types_supported: Vec<String>,

    /// Supported grant types
    pub grant_types_supported: Vec<String>,

    /// Supported PKCE code challenge methods
    pub code_challenge_methods_supported: Vec<String>,

    /// Supported token endpoint auth methods
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Metadata for the stub rooted at `issuer`
    #[must_use]
    pub fn for_issuer(issuer: &str) -> Self {
        let issuer = issuer.trim_end_matches('/');
        Self {
            issuer: issuer.to_string(),
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/token"),
            response_types_supported: strings(&["code"]),
            grant_types_supported: strings(&["authorization_code"]),
            code_challenge_methods_supported: strings(&["S256", "plain"]),
            token_endpoint_auth_methods_supported: strings(&[
                "client_secret_post",
                "client_secret_basic",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// Base URL the caller used to reach us.
///
/// A configured public URL wins; otherwise `X-Forwarded-Proto` (default
/// `http`) and `Host` (default `localhost`) are combined.
#[must_use]
pub fn request_base_url(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = public_url.filter(|u| !u.is_empty()) {
        return url.trim_end_matches('/').to_string();
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = header("x-forwarded-proto")
        .and_then(|p| p.split(',').next())
        .map_or("http", str::trim);
    let host = header("host").unwrap_or("localhost");

    format!("{scheme}://{host}")
}
