//! Banter server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port
//! banter-server
//!
//! # Custom bind address and verbose logging
//! banter-server --bind 0.0.0.0:8080 --log-level debug
//! ```

use banter_server::{MemoryDirectory, Server, ServerRuntimeConfig};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Banter realtime chat server
#[derive(Parser, Debug)]
#[command(name = "banter-server")]
#[command(about = "Banter realtime chat server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:5001")]
    bind: String,

    /// Outbound queue capacity per connection, in frames
    #[arg(long, default_value = "64")]
    queue_depth: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Banter server starting");
    tracing::info!("Binding to {}", args.bind);

    let config = ServerRuntimeConfig { bind_address: args.bind, queue_depth: args.queue_depth };

    let server = Server::bind(config, MemoryDirectory::new()).await?;

    tracing::info!("Server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
