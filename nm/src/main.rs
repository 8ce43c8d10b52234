//! Name Manager entry point: binds the control-plane listener, loads
//! configuration, and spawns one task per accepted connection plus the
//! background liveness sweep (spec §4.2, §4.3).

use clap::Parser;
use nm::config::{load_config, Config};
use nm::namespace::Namespace;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "nm", about = "Name Manager for the distributed file service")]
struct Args {
    /// Path to nm.toml; missing or malformed falls back to defaults.
    #[arg(long, default_value = "nm.toml")]
    config: PathBuf,

    /// Overrides the configured listen address.
    #[arg(long)]
    listen_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nm=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config: Config = load_config(&args.config);
    if let Some(addr) = args.listen_addr {
        config.listen_addr = addr;
    }

    let namespace = Arc::new(RwLock::new(Namespace::new()));

    let sweep_ns = namespace.clone();
    let sweep_interval = config.heartbeat_sweep_interval_secs;
    let dead_after = config.client_dead_after_missed_heartbeats;
    tokio::spawn(async move {
        nm::liveness::run(sweep_ns, sweep_interval, dead_after).await;
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .unwrap();
    tracing::info!(addr = %config.listen_addr, "nm listening");

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        let ns = namespace.clone();
        let span = tracing::info_span!("connection", %peer);
        tokio::spawn(async move {
            use tracing::Instrument;
            nm::connection::handle(socket, peer, ns).instrument(span).await;
        });
    }
}
