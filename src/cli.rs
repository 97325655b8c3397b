//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::vendor::Vendor;

/// Mock MCP server - LLM-fabricated Datadog, GitHub, New Relic and AWS tools
#[derive(Parser, Debug)]
#[command(name = "mock-mcp-server")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "MOCK_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "MOCK_MCP_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "MOCK_MCP_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Print the tool catalog
    Tools {
        /// Only this vendor
        #[arg(long)]
        vendor: Option<VendorArg>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Call one tool through the response generator and print the result
    Invoke {
        /// Vendor owning the tool
        vendor: VendorArg,

        /// Tool name
        tool: String,

        /// Tool arguments as a JSON object (must include `port_context`)
        #[arg(long, default_value = r#"{"port_context": {}}"#)]
        args: String,
    },
}

/// Vendor selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VendorArg {
    /// Datadog
    Datadog,
    /// GitHub
    Github,
    /// New Relic
    Newrelic,
    /// AWS
    Aws,
}

impl From<VendorArg> for Vendor {
    fn from(arg: VendorArg) -> Self {
        match arg {
            VendorArg::Datadog => Self::Datadog,
            VendorArg::Github => Self::Github,
            VendorArg::Newrelic => Self::NewRelic,
            VendorArg::Aws => Self::Aws,
        }
    }
}

/// Catalog output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// `tools/list`-shaped JSON
    Json,
}
