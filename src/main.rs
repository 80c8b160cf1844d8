//! Plain-HTTP Forward Proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │                FORWARD PROXY                 │
//!   Client request    │  ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//!   ──────────────────┼─▶│ listener │──▶│  relay  │──▶│   http    │  │
//!   (absolute-URI)    │  │  accept  │   │  task   │   │ line/URI  │  │
//!                     │  └──────────┘   └────┬────┘   └───────────┘  │
//!                     │                      │ origin-form request   │
//!                     │                      ▼                       ├──▶ Upstream
//!   Client response   │               raw response chunks            │
//!   ◀─────────────────┼──────────────────────────────────────────────┼─── (any host)
//!                     │                                              │
//!                     │   config · lifecycle · observability         │
//!                     └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use forward_proxy::lifecycle::{self, Overrides};
use forward_proxy::ProxyServer;

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Minimal plain-HTTP forward proxy", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:8888
    #[arg(short, long)]
    bind: Option<String>,

    /// Listen port (replaces the port of the bind address)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl From<Cli> for Overrides {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            bind: cli.bind,
            port: cli.port,
            log_level: cli.log_level,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let overrides = Overrides::from(Cli::parse());
    let config = lifecycle::resolve_config(&overrides)?;

    lifecycle::init_observability(&config);
    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let server = ProxyServer::new(config);
    let handle = server.handle();

    tokio::spawn(async move {
        lifecycle::shutdown_signal().await;
        handle.stop();
    });

    if let Err(e) = server.start().await {
        tracing::error!(error = %e, "Proxy server error");
        return Err(e.into());
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
