//! In-memory authorization-code store
//!
//! Codes live only for the process. A code is removed when it is
//! exchanged, so a second exchange never finds it.

use std::time::Instant;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

/// What was recorded when a code was issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    /// PKCE challenge supplied to `/authorize`, if any
    pub code_challenge: Option<String>,
    /// Redirect target supplied to `/authorize`
    pub redirect_uri: String,
    /// Issue time
    pub issued_at: Instant,
}

/// Bearer token pair returned by `/token`
#[derive(Debug, Clone, Serialize)]
pub struct TokenGrant {
    /// Access token
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: &'static str,
    /// Declared lifetime in seconds
    pub expires_in: u64,
    /// Refresh token
    pub refresh_token: String,
}

/// Declared access-token lifetime
pub const ACCESS_TOKEN_TTL_SECS: u64 = 3600;

impl TokenGrant {
    /// Mint a fresh token pair
    #[must_use]
    pub fn issue() -> Self {
        Self {
            access_token: random_token(),
            token_type: "Bearer",
            expires_in: ACCESS_TOKEN_TTL_SECS,
            refresh_token: random_token(),
        }
    }
}

/// 32 random bytes, base64url without padding
#[must_use]
pub fn random_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Outstanding authorization codes
#[derive(Debug, Default)]
pub struct AuthCodeStore {
    codes: DashMap<String, PendingAuthorization>,
}

impl AuthCodeStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint and record a code
    pub fn issue(&self, redirect_uri: &str, code_challenge: Option<&str>) -> String {
        let code = random_token();
        self.codes.insert(
            code.clone(),
            PendingAuthorization {
                code_challenge: code_challenge.map(ToString::to_string),
                redirect_uri: redirect_uri.to_string(),
                issued_at: Instant::now(),
            },
        );
        debug!(pending = self.codes.len(), "Authorization code issued");
        code
    }

    /// Remove and return the record for `code`.
    ///
    /// Removal is atomic: of two concurrent exchanges of one code, exactly
    /// one sees `Some`.
    pub fn consume(&self, code: &str) -> Option<PendingAuthorization> {
        self.codes.remove(code).map(|(_, pending)| pending)
    }

    /// Number of codes not yet exchanged
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no codes are outstanding
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
