//! CLI interface for LifeOS
//!
//! This module provides the command-line interface using clap's derive API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LifeOS intent engine
///
/// Turns free-text commands into plans with a language model and applies
/// them to tasks, projects, your calendar and your savings.
#[derive(Parser, Debug)]
#[command(name = "lifeos")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API and the intent queue scheduler
    Serve {
        /// Override the configured bind address
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Run one command through the pipeline and print the outcome
    Run {
        /// The command, e.g. "add task: buy milk"
        command: String,
    },

    /// Score the current life metrics
    Status,

    /// Show recent memory records
    Memory {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}
