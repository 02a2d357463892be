//! CLI module
//!
//! Thin command-line front end over the client, pagination and cache layers.
//!
//! # Commands
//!
//! - `get` - Fetch a single resource
//! - `list` - Fetch every page of a listing
//! - `health` - Probe the API status endpoint

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat};
pub use runner::{describe, Runner, HEALTH_PATH};
