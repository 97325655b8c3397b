//! Mock MCP Server Library
//!
//! Four fake vendor tool servers (Datadog, GitHub, New Relic, AWS) speaking
//! the Model Context Protocol over Streamable HTTP. Every tool call is
//! answered by asking an LLM to fabricate a plausible vendor response.
//!
//! # Components
//!
//! - **Gate**: IP allow-list, per-IP rate limit, optional shared secret
//! - **OAuth stub**: RFC 8414 discovery, auto-approving authorize, token exchange
//! - **Vendor MCP servers**: sessions plus declarative tool catalogs
//! - **Response generator**: prompt building, LLM call, JSON extraction
//!
//! No vendor is ever contacted and no state survives a restart.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod generator;
pub mod mcp;
pub mod oauth;
pub mod protocol;
pub mod secrets;
pub mod vendor;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "mock-mcp-server";

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Internal(e.to_string())),
    }
}
