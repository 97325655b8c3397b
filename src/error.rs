//! Error types for the mock MCP server

use std::io;

use thiserror::Error;

/// Result type alias for the mock MCP server
pub type Result<T> = std::result::Result<T, Error>;

/// Mock MCP server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential could not be resolved (env var or secret store)
    #[error("Secret error: {0}")]
    Secret(String),

    /// Text-generation backend failure
    #[error("LLM backend error: {0}")]
    Llm(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
    },

    /// A lifecycle handle failed to start or stop
    #[error("Lifecycle error ({name}): {message}")]
    Lifecycle {
        /// Handle name
        name: String,
        /// Failure description
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
        }
    }

    /// Create a lifecycle error for the named handle
    pub fn lifecycle(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lifecycle {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => rpc_codes::PARSE_ERROR,
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::Llm(_) | Self::Http(_) => rpc_codes::SERVER_ERROR_START,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
    /// Server error range start
    pub const SERVER_ERROR_START: i32 = -32000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_codes_follow_error_kind() {
        assert_eq!(Error::json_rpc(-32001, "x").to_rpc_code(), -32001);
        assert_eq!(
            Error::Protocol("bad".into()).to_rpc_code(),
            rpc_codes::INVALID_REQUEST
        );
        assert_eq!(Error::Llm("down".into()).to_rpc_code(), -32000);
        assert_eq!(
            Error::Config("x".into()).to_rpc_code(),
            rpc_codes::INTERNAL_ERROR
        );
    }

    #[test]
    fn lifecycle_error_names_handle() {
        let err = Error::lifecycle("datadog-mock", "already running");
        assert_eq!(
            err.to_string(),
            "Lifecycle error (datadog-mock): already running"
        );
    }
}
