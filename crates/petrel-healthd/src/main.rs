//! petrel-healthd — the Petrel health-check daemon.
//!
//! Serves the monitoring surface (`/status`, `/monitoring/selfcheck`,
//! `/monitoring/node-check`) and fans self-checks out to the cluster
//! through the control-plane gateway.
//!
//! # Usage
//!
//! ```text
//! petrel-healthd --listen 0.0.0.0:8765 \
//!     --bootstrap-config /etc/petrel/bootstrap.toml \
//!     --control-plane http://cp-1.petrel.local:2135
//! ```

mod http;
mod remote;
mod service;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use petrel_health::Gateways;
use petrel_types::bootstrap::BootstrapConfig;

use crate::remote::RemoteGateway;
use crate::service::HealthService;

#[derive(Parser)]
#[command(name = "petrel-healthd", about = "Petrel health-check daemon")]
struct Cli {
    /// Address to serve the monitoring surface on.
    #[arg(long, default_value = "0.0.0.0:8765")]
    listen: SocketAddr,

    /// Path to the cluster bootstrap configuration.
    #[arg(long, default_value = "/etc/petrel/bootstrap.toml")]
    bootstrap_config: PathBuf,

    /// Base URL of the control-plane monitoring gateway.
    #[arg(long, default_value = "http://127.0.0.1:2135")]
    control_plane: String,

    /// This node's id; node checks resolve the local monitoring
    /// endpoint through its whiteboard.
    #[arg(long, default_value = "1")]
    node_id: u32,

    /// Per-call gateway timeout in milliseconds.
    #[arg(long, default_value = "5000")]
    gateway_timeout: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.bootstrap_config)?;
    let bootstrap: BootstrapConfig = toml::from_str(&raw)?;
    info!(
        path = ?cli.bootstrap_config,
        domain = %bootstrap.domain_path(),
        static_pdisks = bootstrap.static_service_set.pdisks.len(),
        "bootstrap configuration loaded"
    );

    let gateway = Arc::new(RemoteGateway::new(
        &cli.control_plane,
        Duration::from_millis(cli.gateway_timeout),
    )?);
    let gateways = Gateways {
        tablets: gateway.clone(),
        scheme_cache: gateway.clone(),
        nodes: gateway,
    };

    let service = HealthService::new(gateways, Arc::new(bootstrap), cli.node_id);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(
        listen = %cli.listen,
        control_plane = %cli.control_plane,
        node_id = cli.node_id,
        "monitoring surface up"
    );
    axum::serve(listener, http::router(service)).await?;
    Ok(())
}
