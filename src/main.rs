//! Kibo Commerce MCP server binary

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tokio::signal;
use tracing::{error, info, warn};

use kibo_mcp::{
    api::KiboClient,
    auth::TokenManager,
    cli::{Cli, Command},
    config::KiboConfig,
    server::{McpServer, serve_stdio},
    setup_tracing,
    tools::{self, ToolRegistry},
    transport::{DEFAULT_TIMEOUT, build_client},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.map(|f| f.as_str())) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Some(Command::Tools) => print_catalog(),
        Some(Command::Call { tool, args }) => run_call(config_path, &tool, &args).await,
        Some(Command::Token) => run_token(config_path).await,
        Some(Command::Serve) | None => run_server(config_path).await,
    }
}

/// Load configuration and obtain the first token.
async fn connect(config_path: Option<&Path>) -> kibo_mcp::Result<(TokenManager, KiboClient)> {
    let config = KiboConfig::load(config_path)?;
    info!(
        api_host = %config.api_host,
        tenant = config.tenant_id,
        site = config.site_id,
        "Configuration loaded"
    );

    let http = build_client(DEFAULT_TIMEOUT)?;
    let tokens = TokenManager::new(http.clone(), Arc::new(config));
    tokens.initialize().await?;

    let client = KiboClient::authenticated(tokens.clone(), http)?;
    Ok((tokens, client))
}

async fn run_server(config_path: Option<&Path>) -> ExitCode {
    let (_tokens, client) = match connect(config_path).await {
        Ok(connected) => connected,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    let registry = match ToolRegistry::with_kibo_tools(&client) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Failed to register tools");
            return ExitCode::FAILURE;
        }
    };
    let server = Arc::new(McpServer::new(registry));

    info!(version = env!("CARGO_PKG_VERSION"), "Kibo MCP server starting");
    tokio::select! {
        result = serve_stdio(server) => match result {
            Ok(()) => {
                info!("Client disconnected");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Server error");
                ExitCode::FAILURE
            }
        },
        () = shutdown_signal() => ExitCode::SUCCESS,
    }
}

fn print_catalog() -> ExitCode {
    match serde_json::to_string_pretty(&tools::catalog()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize tool catalog: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_call(config_path: Option<&Path>, tool: &str, args: &str) -> ExitCode {
    let arguments: Value = match serde_json::from_str(args) {
        Ok(arguments) => arguments,
        Err(e) => {
            eprintln!("--args is not valid JSON: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (_tokens, client) = match connect(config_path).await {
        Ok(connected) => connected,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match ToolRegistry::with_kibo_tools(&client) {
        Ok(registry) => registry.call(tool, arguments).await,
        Err(e) => Err(e),
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match outcome.to_text() {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("Failed to render result: {e}");
            return ExitCode::FAILURE;
        }
    }
    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn run_token(config_path: Option<&Path>) -> ExitCode {
    let (tokens, _client) = match connect(config_path).await {
        Ok(connected) => connected,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&tokens.token_info()) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to serialize token info: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Resolves on SIGINT or SIGTERM
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
            Ok(mut stream) => {
                stream.recv().await;
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
