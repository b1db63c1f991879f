//! Process bring-up: wire a [`Config`], a [`MemoryHandler`], and a
//! [`Listener`] together. No CLI flag parsing or config files —
//! configuration is the single `TFTP_PORT` environment variable.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tftpd::{Config, Listener, MemoryHandler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let handler = Arc::new(MemoryHandler::new());

    let listener = Listener::bind(config.bind_addr, handler).await?;
    listener.serve().await?;
    Ok(())
}
