//! Key/value server.
//!
//! This binary runs the TCP server that accepts protocol lines from clients.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kvline::{Config, Server, ServerCli};

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = ServerCli::parse();

    let config = Config::new()
        .listen_addr(args.host)
        .strict_keys(args.strict_keys)
        .build();

    let server = Server::bind(&config).await?;
    server.run().await?;

    Ok(())
}
