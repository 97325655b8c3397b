//! Mock MCP Server - LLM-backed fake vendor tool servers

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde_json::{Value, json};
use tracing::{error, info};

use mock_mcp_server::{
    cli::{Cli, Command, OutputFormat, VendorArg},
    config::Config,
    gateway::Gateway,
    generator::ResponseGenerator,
    mcp::{ToolRegistry, ToolSpec},
    secrets, setup_tracing,
    vendor::Vendor,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Some(Command::Tools { vendor, format }) => run_tools(vendor, format),
        Some(Command::Invoke { vendor, tool, args }) => {
            run_invoke(config_path, vendor.into(), &tool, &args).await
        }
        Some(Command::Serve { port, host }) => run_server(config_path, port, host).await,
        None => run_server(config_path, None, None).await,
    }
}

/// Run the HTTP server
async fn run_server(config_path: Option<&Path>, port: Option<u16>, host: Option<String>) -> ExitCode {
    let mut config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    let gateway = match Gateway::new(config).await {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gateway.run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}

/// Print the tool catalog; needs no credentials
fn run_tools(vendor: Option<VendorArg>, format: OutputFormat) -> ExitCode {
    let vendors: Vec<Vendor> = match vendor {
        Some(v) => vec![v.into()],
        None => Vendor::ALL.to_vec(),
    };

    match format {
        OutputFormat::Json => {
            let catalog: serde_json::Map<String, Value> = vendors
                .iter()
                .map(|v| {
                    let tools: Vec<_> = v.tools().iter().map(ToolSpec::to_tool).collect();
                    (v.to_string(), json!({"tools": tools}))
                })
                .collect();
            match serde_json::to_string_pretty(&catalog) {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("Failed to serialize catalog: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        OutputFormat::Table => {
            for vendor in vendors {
                println!("{vendor} ({})", vendor.server_name());
                for tool in vendor.tools() {
                    let params: Vec<String> = tool
                        .params
                        .iter()
                        .map(|p| {
                            if p.required {
                                format!("{}: {}", p.name, p.kind)
                            } else {
                                format!("{}?: {}", p.name, p.kind)
                            }
                        })
                        .collect();
                    println!("  {:<34} {}", tool.name, tool.description);
                    println!("  {:<34} ({}, port_context: object)", "", params.join(", "));
                }
                println!();
            }
        }
    }
    ExitCode::SUCCESS
}

/// Call one tool through the generator and print the JSON it produced
async fn run_invoke(config_path: Option<&Path>, vendor: Vendor, tool: &str, args: &str) -> ExitCode {
    let arguments: Value = match serde_json::from_str(args) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("--args is not valid JSON: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let generator = match secrets::resolve_api_key(&config.llm)
        .await
        .and_then(|key| ResponseGenerator::anthropic(&config, key))
    {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to set up the response generator: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = ToolRegistry::new(vendor, generator)
        .call(tool, &arguments)
        .await;

    for item in &result.content {
        let text = item.as_text();
        match serde_json::from_str::<Value>(text).and_then(|v| serde_json::to_string_pretty(&v)) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{text}"),
        }
    }

    if result.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
