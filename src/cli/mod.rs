//! CLI module for correlog
//!
//! # Commands
//!
//! - `serve` - Start the demo server with request correlation enabled
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Write a starter config, then serve with it
//! correlog config init
//! correlog serve --project my-project --module default
//!
//! # Generate shell completions
//! correlog completions bash > ~/.bash_completion.d/correlog
//! ```

pub mod completions;
pub mod config;
pub mod serve;

pub use completions::handle_completions;
pub use config::handle_config_init;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// correlog - request-scoped log correlation
#[derive(Parser, Debug)]
#[command(
    name = "correlog",
    version,
    about = "Request-scoped log correlation for HTTP services"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the demo server
    Serve(ServeArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "correlog.toml")]
    pub config: PathBuf,

    /// Override server port
    #[arg(short, long, env = "CORRELOG_PORT")]
    pub port: Option<u16>,

    /// Override server host
    #[arg(short = 'H', long, env = "CORRELOG_HOST")]
    pub host: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CORRELOG_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Cloud project that owns the traces
    #[arg(long)]
    pub project: Option<String>,

    /// Service name reported in the resource labels
    #[arg(long)]
    pub module: Option<String>,

    /// Version reported in the resource labels
    #[arg(long = "service-version")]
    pub version: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "correlog.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,

    /// Project ID to write into `[correlation] project`
    #[arg(short, long)]
    pub project: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
