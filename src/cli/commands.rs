//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Netpicker API client
#[derive(Parser, Debug)]
#[command(name = "netpicker")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (YAML); NETPICKER_* environment variables are used otherwise
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Tenant
    #[arg(short, long, global = true)]
    pub tenant: Option<String>,

    /// Bearer token
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<f64>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a single resource
    Get {
        /// API path; `{tenant}` is replaced with the tenant
        path: String,

        /// Query parameter (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Fetch every page of a listing
    List {
        /// API path; `{tenant}` is replaced with the tenant
        path: String,

        /// Items per page
        #[arg(long, default_value = "100")]
        page_size: u64,

        /// Fetch pages concurrently when the total is known
        #[arg(long)]
        parallel: bool,

        /// Maximum pages in flight with --parallel
        #[arg(long, default_value = "4")]
        max_concurrency: usize,

        /// Do not reuse results within this invocation
        #[arg(long)]
        no_cache: bool,

        /// Return the pages that succeeded instead of failing
        #[arg(long)]
        allow_partial: bool,

        /// Item field used to drop duplicates (dotted path)
        #[arg(long)]
        unique_key: Option<String>,

        /// Query filter (repeatable)
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Check that the API is reachable and the token is accepted
    Health,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Indented JSON
    Pretty,
}

/// Parse a `KEY=VALUE` pair
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
