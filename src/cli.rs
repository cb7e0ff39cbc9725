//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// MCP server for the Kibo Commerce API
#[derive(Parser, Debug)]
#[command(name = "kibo-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Optional YAML file with KIBO_* settings; environment variables win
    #[arg(short, long, env = "KIBO_MCP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format
    #[arg(long, value_enum, env = "MCP_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Name understood by [`crate::setup_tracing`]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Authenticate and serve MCP over stdin/stdout (default)
    Serve,

    /// Print the tool catalog as JSON; needs no credentials
    Tools,

    /// Authenticate, run one tool and print its result envelope
    Call {
        /// Tool name, e.g. `kibo_order_details`
        tool: String,

        /// Tool arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Authenticate and print token status (never the token itself)
    Token,
}
