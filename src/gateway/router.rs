//! HTTP router and handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use super::gate::{Gate, gate_middleware};
use super::lifecycle::LifecycleChain;
use super::rate_limit::RateWindow;
use crate::config::Config;
use crate::generator::ResponseGenerator;
use crate::mcp::{McpServer, SESSION_HEADER, SessionManager, ToolRegistry};
use crate::oauth::{self, AuthCodeStore, OAuthStub};
use crate::vendor::Vendor;
use crate::{Result, SERVICE_NAME};

/// Shared application state
#[derive(Debug)]
pub struct AppState {
    /// One MCP server per vendor
    pub servers: HashMap<Vendor, Arc<McpServer>>,
    /// Session managers in start order
    pub lifecycle: Arc<LifecycleChain>,
    /// Request gate
    pub gate: Arc<Gate>,
    /// Authorization-code stub
    pub oauth: Arc<OAuthStub>,
    /// Per-caller request counters, shared by all vendors
    pub rate: Arc<RateWindow>,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl AppState {
    /// Assemble every component from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the gate configuration is invalid.
    pub fn new(config: &Config, generator: &ResponseGenerator) -> Result<Self> {
        let rate = Arc::new(RateWindow::new(
            config.security.rate_limit,
            config.security.rate_limit_window,
        ));
        let gate = Arc::new(Gate::from_config(&config.security, Arc::clone(&rate))?);
        let oauth = Arc::new(OAuthStub::new(
            Arc::new(AuthCodeStore::new()),
            &config.server,
            &config.oauth,
        ));

        let mut servers = HashMap::new();
        let mut lifecycle = LifecycleChain::new();
        for vendor in Vendor::ALL {
            let sessions = Arc::new(SessionManager::new(vendor));
            lifecycle.push(sessions.clone());
            let registry = ToolRegistry::new(vendor, generator.clone());
            servers.insert(vendor, Arc::new(McpServer::new(sessions, registry)));
        }

        Ok(Self {
            servers,
            lifecycle: Arc::new(lifecycle),
            gate,
            oauth,
            rate,
            max_body_size: config.server.max_body_size,
        })
    }

    fn server(&self, vendor: &str) -> Option<&Arc<McpServer>> {
        vendor
            .parse::<Vendor>()
            .ok()
            .and_then(|v| self.servers.get(&v))
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    let gate = Arc::clone(&state.gate);
    let oauth = Arc::clone(&state.oauth);
    let max_body_size = state.max_body_size;

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/{vendor}",
            post(mcp_post_handler)
                .delete(mcp_delete_handler)
                .get(mcp_get_handler),
        )
        .route(
            "/{vendor}/mcp",
            post(mcp_post_handler)
                .delete(mcp_delete_handler)
                .get(mcp_get_handler),
        )
        .with_state(state)
        .merge(oauth::router(oauth))
        .layer(middleware::from_fn_with_state(gate, gate_middleware))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.lifecycle.is_ready() {
        (
            StatusCode::OK,
            Json(json!({"status": "healthy", "service": SERVICE_NAME})),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "starting", "service": SERVICE_NAME})),
        )
    }
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

/// `POST /<vendor>[/mcp]` - one JSON-RPC message
async fn mcp_post_handler(
    State(state): State<Arc<AppState>>,
    Path(vendor): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(server) = state.server(&vendor) else {
        debug!(vendor = %vendor, "Unknown vendor prefix");
        return StatusCode::NOT_FOUND.into_response();
    };
    server
        .handle_post(session_header(&headers), &body)
        .await
        .into_response()
}

/// `DELETE /<vendor>[/mcp]` - session termination
async fn mcp_delete_handler(
    State(state): State<Arc<AppState>>,
    Path(vendor): Path<String>,
    headers: HeaderMap,
) -> StatusCode {
    match state.server(&vendor) {
        Some(server) => server.handle_delete(session_header(&headers)),
        None => StatusCode::NOT_FOUND,
    }
}

/// `GET /<vendor>[/mcp]` - no server-initiated stream is offered
async fn mcp_get_handler(
    State(state): State<Arc<AppState>>,
    Path(vendor): Path<String>,
) -> Response {
    if state.server(&vendor).is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
    )
        .into_response()
}
