//! `berth-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use anyhow::Result;

use berth_api::config::Config;
use berth_api::server::Server;
use berth_core::observability::{init_logging, LogFormat};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    if !config.debug {
        anyhow::bail!(
            "no production KV backend is configured in this build; set BERTH_DEBUG=true to run with the in-memory backend"
        );
    }
    tracing::warn!("using in-memory KV backend and collaborators (debug only)");

    let server = Server::new(config);
    server.serve().await?;
    Ok(())
}
