//! Command-line interface for compliance-ai.
//!
//! Provides commands to serve the HTTP API, run the pipeline once over a
//! regulation, and apply database migrations.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
