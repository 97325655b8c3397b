//! Discovery, authorize and token endpoints

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use url::Url;

use super::metadata::{AuthorizationServerMetadata, request_base_url};
use super::store::{AuthCodeStore, TokenGrant};
use crate::config::{OAuthStubConfig, ServerConfig};
use crate::vendor::Vendor;

/// Path of the discovery document
pub const DISCOVERY_PATH: &str = "/.well-known/oauth-authorization-server";

/// Auto-approving authorization-code stub
#[derive(Debug)]
pub struct OAuthStub {
    codes: Arc<AuthCodeStore>,
    public_url: Option<String>,
    strict_code_exchange: bool,
}

impl OAuthStub {
    /// Stub backed by `codes`
    #[must_use]
    pub fn new(codes: Arc<AuthCodeStore>, server: &ServerConfig, oauth: &OAuthStubConfig) -> Self {
        Self {
            codes,
            public_url: server.public_url.clone(),
            strict_code_exchange: oauth.strict_code_exchange,
        }
    }

    /// Outstanding codes
    #[must_use]
    pub fn codes(&self) -> &Arc<AuthCodeStore> {
        &self.codes
    }
}

/// Routes for the handshake surface
pub fn router(stub: Arc<OAuthStub>) -> Router {
    Router::new()
        .route(DISCOVERY_PATH, get(discovery_handler))
        .route(
            &format!("/{{vendor}}{DISCOVERY_PATH}"),
            get(vendor_discovery_handler),
        )
        .route("/authorize", get(authorize_handler))
        .route("/token", post(token_handler))
        .with_state(stub)
}

async fn discovery_handler(State(stub): State<Arc<OAuthStub>>, headers: HeaderMap) -> Response {
    discovery(&stub, &headers)
}

async fn vendor_discovery_handler(
    State(stub): State<Arc<OAuthStub>>,
    Path(vendor): Path<String>,
    headers: HeaderMap,
) -> Response {
    if vendor.parse::<Vendor>().is_err() {
        return StatusCode::NOT_FOUND.into_response();
    }
    discovery(&stub, &headers)
}

fn discovery(stub: &OAuthStub, headers: &HeaderMap) -> Response {
    let issuer = request_base_url(stub.public_url.as_deref(), headers);
    debug!(issuer = %issuer, "Serving authorization server metadata");
    Json(AuthorizationServerMetadata::for_issuer(&issuer)).into_response()
}

/// `/authorize` query parameters
#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    /// Where to send the browser back to
    pub redirect_uri: Option<String>,
    /// Opaque client state, echoed back
    pub state: Option<String>,
    /// PKCE challenge; recorded, never verified
    pub code_challenge: Option<String>,
}

async fn authorize_handler(
    State(stub): State<Arc<OAuthStub>>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let Some(redirect_uri) = params.redirect_uri.filter(|u| !u.is_empty()) else {
        return json_error(StatusCode::BAD_REQUEST, "missing redirect_uri");
    };

    let code = stub
        .codes
        .issue(&redirect_uri, params.code_challenge.as_deref());
    let location = redirect_location(&redirect_uri, &code, params.state.as_deref().unwrap_or_default());
    info!(pkce = params.code_challenge.is_some(), "Authorization auto-approved");

    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Append `code` and `state` to `redirect_uri`, keeping any existing query.
/// `state` is always present, empty when the client sent none.
fn redirect_location(redirect_uri: &str, code: &str, state: &str) -> String {
    if let Ok(mut url) = Url::parse(redirect_uri) {
        url.query_pairs_mut()
            .append_pair("code", code)
            .append_pair("state", state);
        return url.into();
    }

    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    format!(
        "{redirect_uri}{separator}code={code}&state={}",
        encode_component(state)
    )
}

fn encode_component(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

async fn token_handler(
    State(stub): State<Arc<OAuthStub>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let code = match token_request_code(&headers, &body) {
        Ok(code) => code,
        Err(message) => {
            debug!(error = %message, "Malformed token request");
            return json_error(StatusCode::BAD_REQUEST, &message);
        }
    };

    let exchanged = code.as_deref().and_then(|c| stub.codes.consume(c));
    if exchanged.is_none() {
        if stub.strict_code_exchange {
            warn!(code_present = code.is_some(), "Rejected unknown or reused authorization code");
            return json_error(StatusCode::BAD_REQUEST, "invalid_grant");
        }
        warn!(code_present = code.is_some(), "Issuing token without a matching authorization code");
    }

    (
        StatusCode::OK,
        [(header::CACHE_CONTROL, "no-store")],
        Json(TokenGrant::issue()),
    )
        .into_response()
}

/// Pull `code` out of a JSON or form-encoded token request
fn token_request_code(headers: &HeaderMap, body: &[u8]) -> Result<Option<String>, String> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        let fields: serde_json::Map<String, Value> =
            serde_json::from_slice(body).map_err(|e| format!("invalid JSON body: {e}"))?;
        Ok(fields.get("code").and_then(Value::as_str).map(ToString::to_string))
    } else {
        let mut fields: HashMap<String, String> =
            serde_urlencoded::from_bytes(body).map_err(|e| format!("invalid form body: {e}"))?;
        Ok(fields.remove("code"))
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": message}))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn redirect_appends_to_plain_uri() {
        assert_eq!(
            redirect_location("https://app.example.com/cb", "abc", "xyz"),
            "https://app.example.com/cb?code=abc&state=xyz"
        );
    }

    #[test]
    fn redirect_keeps_existing_query() {
        assert_eq!(
            redirect_location("https://app.example.com/cb?tenant=7", "abc", "s 1"),
            "https://app.example.com/cb?tenant=7&code=abc&state=s+1"
        );
    }

    #[test]
    fn redirect_without_state_carries_empty_state() {
        assert_eq!(
            redirect_location("https://app.example.com/cb", "abc", ""),
            "https://app.example.com/cb?code=abc&state="
        );
    }

    #[test]
    fn unparseable_redirect_falls_back_to_concatenation() {
        assert_eq!(
            redirect_location("/relative/cb?x=1", "abc", "a&b"),
            "/relative/cb?x=1&code=abc&state=a%26b"
        );
    }

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers
    }

    #[test]
    fn code_from_json_body() {
        let code = token_request_code(&json_headers(), br#"{"grant_type":"authorization_code","code":"abc"}"#);
        assert_eq!(code.unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn code_from_form_body() {
        let code = token_request_code(&HeaderMap::new(), b"grant_type=authorization_code&code=a%2Bb");
        assert_eq!(code.unwrap().as_deref(), Some("a+b"));
    }

    #[test]
    fn missing_code_is_none() {
        assert_eq!(token_request_code(&json_headers(), b"{}").unwrap(), None);
        assert_eq!(token_request_code(&HeaderMap::new(), b"").unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = token_request_code(&json_headers(), b"{not json").unwrap_err();
        assert!(err.starts_with("invalid JSON body"));
        assert!(token_request_code(&json_headers(), b"[1,2]").is_err());
    }
}
