//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

/// netchat - chat with everyone on the server from your terminal
#[derive(Debug, Parser)]
#[command(name = "netchat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "NETCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Server address (host:port)
    #[arg(long, short)]
    pub server: Option<String>,

    /// Display name to register
    #[arg(long, short)]
    pub nick: Option<String>,

    /// Connection timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}
