//! Shared line document server
//! Every connected session edits the same document and sees every applied change

use clap::Parser;
use collaboration::{
    CommandDispatcher, ConnectionListener, ServerConfig, SessionRegistry,
    DEFAULT_MAX_LINE_LENGTH, DEFAULT_OUTBOUND_QUEUE,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "collab-server")]
#[command(about = "Multi-session line editing server")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    bind: SocketAddr,

    /// Longest accepted command line in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_LINE_LENGTH)]
    max_line_length: usize,

    /// Messages buffered per session before it is dropped as lagging
    #[arg(long, default_value_t = DEFAULT_OUTBOUND_QUEUE)]
    outbound_queue: usize,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> ServerConfig {
        ServerConfig {
            bind: self.bind,
            max_line_length: self.max_line_length,
            outbound_queue: self.outbound_queue,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "collab_server=debug,collaboration=debug,document=debug"
    } else {
        "collab_server=info,collaboration=info,document=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.config();
    let registry = Arc::new(SessionRegistry::new(config.outbound_queue));
    let dispatcher = Arc::new(CommandDispatcher::new(registry));
    let listener = ConnectionListener::bind(config, dispatcher).await?;

    tokio::select! {
        result = listener.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
