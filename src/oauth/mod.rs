//! OAuth handshake stub
//!
//! Just enough of the authorization-code flow for MCP clients that insist
//! on completing it:
//! - RFC 8414 discovery at the root and under every vendor prefix
//! - auto-approving `/authorize` that mints single-use codes
//! - `/token` that exchanges codes for opaque bearer tokens
//!
//! Tokens are never stored or validated.

mod handlers;
mod metadata;
mod store;

pub use handlers::{AuthorizeParams, DISCOVERY_PATH, OAuthStub, router};
pub use metadata::{AuthorizationServerMetadata, request_base_url};
pub use store::{
    ACCESS_TOKEN_TTL_SECS, AuthCodeStore, PendingAuthorization, TokenGrant, random_token,
};
