//! netchatd entry point.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::Level;

use netchat_core::{TracingConfig, init_tracing};
use netchat_server::{
    ChatServer, MemoryUserStore, ServerConfig, ServerResult, SignalHandler, UserStore,
    default_bind_addr,
};

/// netchatd - the netchat daemon
#[derive(Debug, Parser)]
#[command(name = "netchatd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address and port to listen on
    #[arg(long, short, env = "NETCHAT_BIND", default_value_t = default_bind_addr())]
    bind: SocketAddr,

    /// Maximum concurrent client connections
    #[arg(long, default_value = "100")]
    max_connections: usize,

    /// Reserve a display name so nobody can claim it (can be repeated)
    #[arg(long, action = clap::ArgAction::Append)]
    reserve: Vec<String>,

    /// Log human-readable lines instead of JSON
    #[arg(long)]
    plain_logs: bool,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut tracing_config = if args.plain_logs {
        TracingConfig::default()
    } else {
        TracingConfig::daemon()
    };
    if args.debug {
        tracing_config = tracing_config.with_level(Level::DEBUG);
    }
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> ServerResult<()> {
    let store = Arc::new(MemoryUserStore::new());
    for name in &args.reserve {
        store.register_nickname(name).await?;
    }

    let config = ServerConfig::new(args.bind).with_max_connections(args.max_connections);
    let server = ChatServer::bind(config, store).await?;

    let signals = SignalHandler::new();
    signals.spawn_listener();

    server.run_until_shutdown(signals.shutdown().wait()).await
}
