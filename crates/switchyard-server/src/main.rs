//! Switchyard server binary.
//!
//! # Usage
//!
//! ```bash
//! # Let the OS pick a port (printed after bind)
//! switchyard-server
//!
//! # Fixed port, verbose logging
//! switchyard-server 4000 --log-level debug
//! ```

use clap::Parser;
use switchyard_server::{ConnectionConfig, DriverConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Switchyard handle chat server
#[derive(Parser, Debug)]
#[command(name = "switchyard-server")]
#[command(about = "Handle registration and message relay over TCP")]
#[command(version)]
struct Args {
    /// TCP port to listen on (0 picks an ephemeral port)
    #[arg(default_value_t = 0)]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Consecutive read errors before a connection is dropped
    #[arg(long, default_value = "3")]
    max_read_errors: u32,

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

    let config = ServerRuntimeConfig {
        bind_address: format!("{}:{}", args.host, args.port),
        driver: DriverConfig { max_connections: args.max_connections },
        connection: ConnectionConfig {
            max_read_errors: args.max_read_errors,
            ..Default::default()
        },
    };

    let server = Server::bind(config).await?;

    tracing::info!("Server is using port {}", server.local_addr()?.port());

    server.run().await?;

    Ok(())
}
