//! Serve command handler
//!
//! Runs the REST facade in the foreground. Settings the facade cannot start
//! without are checked here, before the vendor client is built.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::server;
use clap::Args;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Serve command arguments
#[derive(Args)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
}

/// Apply command-line overrides and reject settings the facade can't serve
fn prepare(mut config: Config, args: &ServeArgs) -> Result<(Config, SocketAddr)> {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // /api/status reports the backend, so an unknown name is fatal here
    config.map_backend()?;

    let addr = config
        .server_addr()
        .parse::<SocketAddr>()
        .map_err(|e| Error::Server(format!("Invalid server address {}: {}", config.server_addr(), e)))?;

    Ok((config, addr))
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let (config, addr) = prepare(Config::load()?, &args)?;

    if config.resolved_api_key().is_empty() {
        warn!("No geocoding API key configured; geocode endpoints will answer 502");
    }

    info!(
        backend = %config.map.backend,
        cache_ttl_secs = config.cache.ttl_secs,
        cache_persist = config.cache.persist,
        "Starting rescue-geo server v{} on {}",
        env!("CARGO_PKG_VERSION"),
        addr
    );

    server::run(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(host: Option<&str>, port: Option<u16>) -> ServeArgs {
        ServeArgs {
            host: host.map(str::to_string),
            port,
        }
    }

    fn base_config() -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 8080;
        config.map.backend = "surface".to_string();
        config
    }

    #[test]
    fn test_prepare_applies_overrides() {
        let (config, addr) = prepare(base_config(), &args(Some("0.0.0.0"), Some(9090))).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(addr, "0.0.0.0:9090".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_prepare_keeps_config_without_overrides() {
        let (config, addr) = prepare(base_config(), &args(None, None)).unwrap();

        assert_eq!(config.server_addr(), "127.0.0.1:8080");
        assert_eq!(addr.port(), 8080);
    }

    #[test]
    fn test_prepare_rejects_unknown_backend() {
        let mut config = base_config();
        config.map.backend = "canvas".to_string();

        let err = prepare(config, &args(None, None)).err().expect("unknown backend must fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_prepare_rejects_unparsable_host() {
        let err = prepare(base_config(), &args(Some("not a host"), None))
            .err()
            .expect("bad host must fail");
        assert!(matches!(err, Error::Server(_)));
    }
}
