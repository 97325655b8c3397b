//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::config::Config;
use crate::generator::ResponseGenerator;
use crate::vendor::Vendor;
use crate::{Error, Result, secrets};

/// Mock MCP server: one listener, four vendor endpoints
#[derive(Debug)]
pub struct Gateway {
    config: Config,
    state: Arc<AppState>,
}

impl Gateway {
    /// Resolve the backend credential and assemble the server
    ///
    /// # Errors
    ///
    /// Returns an error if the API key cannot be resolved or the
    /// configuration is invalid.
    pub async fn new(config: Config) -> Result<Self> {
        let api_key = secrets::resolve_api_key(&config.llm).await?;
        let generator = ResponseGenerator::anthropic(&config, api_key)?;
        Self::with_generator(config, &generator)
    }

    /// Assemble the server around an existing generator
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_generator(config: Config, generator: &ResponseGenerator) -> Result<Self> {
        let state = Arc::new(AppState::new(&config, generator)?);
        Ok(Self { config, state })
    }

    /// Shared state, for embedding the router elsewhere
    #[must_use]
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Start the session managers, serve until a shutdown signal, then stop
    /// them in reverse order
    ///
    /// # Errors
    ///
    /// Returns an error if a session manager fails to start, the address
    /// cannot be bound, or the server fails.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        self.state.lifecycle.start_all().await?;

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.state.lifecycle.stop_all().await;
                return Err(e.into());
            }
        };

        self.log_banner();

        let app = create_router(Arc::clone(&self.state));
        let served = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(e.to_string()));

        info!("Stopping session managers...");
        self.state.lifecycle.stop_all().await;

        served
    }

    fn log_banner(&self) {
        let server = &self.config.server;
        let gate = &self.state.gate;
        let rate = &self.state.rate;

        info!("============================================================");
        info!("MOCK MCP SERVER v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %server.host, port = server.port, "Listening");
        info!(model = %self.config.llm.model, "Responses generated by LLM");

        if gate.enforces_allowlist() {
            info!(allowed = ?self.config.security.allowed_ips, "IP allow-list enforced (loopback always admitted)");
        } else {
            warn!("IP allow-list disabled - any caller may connect");
        }
        info!(
            limit = rate.limit(),
            window_secs = rate.window().as_secs(),
            "Per-IP rate limit"
        );
        if gate.requires_secret() {
            info!("Shared secret required (X-MCP-Secret or Bearer token)");
        } else {
            warn!("No shared secret configured");
        }

        info!("Vendor endpoints:");
        for vendor in Vendor::ALL {
            info!("  POST /{vendor}/mcp  ({} tools)", vendor.tools().len());
        }
        info!("============================================================");
    }
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
