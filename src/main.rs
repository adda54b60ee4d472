//! fileferry: a minimal file transfer server
//!
//! Clients connect over TCP, are greeted with `HELLO`, and issue exactly
//! one command per connection:
//! - `GET <name>` streams the named file back
//! - `PUT <name>` stores the inbound body under the name
//! - `BYE` closes the connection
//!
//! Features:
//! - One isolated task per connection; a stalled client never blocks accepts
//! - Fixed-size transfer buffer, so file size is unbounded
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocol;
mod server;
mod transfer;

use config::Config;
use server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        root = %config.root.display(),
        "Starting fileferry server"
    );

    Server::new(&config).run().await?;
    Ok(())
}
