//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and apply command line overrides
//! - Initialize logging and metrics before the listener starts
//!
//! # Design Decisions
//! - Fail fast: any configuration error is fatal
//! - Overrides are validated together with the file they override

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{load_config, validate_config, ConfigError, ProxyConfig};
use crate::observability::{logging, metrics};

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Build the effective configuration.
pub fn resolve_config(overrides: &Overrides) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &overrides.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(bind) = &overrides.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(port) = overrides.port {
        config.listener.bind_address = with_port(&config.listener.bind_address, port);
    }
    if let Some(level) = &overrides.log_level {
        config.observability.log_level = level.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Replace the port of a bind address. Unparseable addresses are returned
/// unchanged for validation to report.
fn with_port(bind_address: &str, port: u16) -> String {
    match bind_address.parse::<SocketAddr>() {
        Ok(mut addr) => {
            addr.set_port(port);
            addr.to_string()
        }
        Err(_) => bind_address.to_string(),
    }
}

/// Bring up logging and, when enabled, the metrics endpoint.
pub fn init_observability(config: &ProxyConfig) {
    logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        buffer_size = config.relay.buffer_size,
        rewrite = ?config.relay.rewrite,
        connect_timeout_secs = config.timeouts.connect_secs,
        idle_timeout_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
}
