//! Server configuration.

use std::net::SocketAddr;

use berth_core::{Error, Result};

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,
    /// Development mode: pretty logs and the in-memory backend allowed.
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8889)),
            debug: false,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BERTH_LISTEN_ADDR`: listener address (default `0.0.0.0:8889`)
    /// - `BERTH_DEBUG`: `true`/`1` enables development mode
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when `BERTH_LISTEN_ADDR` does not parse.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BERTH_LISTEN_ADDR") {
            config.listen_addr = addr.parse().map_err(|e| {
                Error::invalid_request(format!("invalid BERTH_LISTEN_ADDR '{addr}': {e}"))
            })?;
        }

        if let Ok(debug) = std::env::var("BERTH_DEBUG") {
            config.debug = matches!(debug.as_str(), "1" | "true" | "TRUE" | "True");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_the_bbs_port() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 8889);
        assert!(!config.debug);
    }
}
