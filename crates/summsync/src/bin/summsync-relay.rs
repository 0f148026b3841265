//! Runs a summsync relay.
//!
//! Configured through `SUMMSYNC_BIND` and `SUMMSYNC_IDLE_TIMEOUT_SECS`;
//! log filtering through `RUST_LOG` (default `info`).

use summsync::{RelayConfig, RelayServer, SummsyncError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SummsyncError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::from_env()?;
    let server = RelayServer::builder().config(config).build().await?;
    server.run().await
}
