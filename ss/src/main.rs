//! Storage Server entry point: binds the data-plane listener, registers
//! with NM, and starts the heartbeat task (spec §4.3, §6).

use clap::Parser;
use ss::config::{load_config, Config};
use ss::state::SsState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ss", about = "Storage Server for the distributed file service")]
struct Args {
    /// Path to ss.toml; missing or malformed falls back to defaults.
    #[arg(long, default_value = "ss.toml")]
    config: PathBuf,

    #[arg(long)]
    listen_addr: Option<SocketAddr>,

    #[arg(long)]
    nm_addr: Option<SocketAddr>,

    #[arg(long)]
    base_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ss=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config: Config = load_config(&args.config);
    if let Some(addr) = args.listen_addr {
        config.listen_addr = addr;
    }
    if let Some(addr) = args.nm_addr {
        config.nm_addr = addr;
    }
    if let Some(dir) = args.base_dir {
        config.base_dir = dir;
    }

    let state = Arc::new(SsState::new(&config).expect("failed to prepare base_dir"));

    let nm_addr = config.nm_addr;
    let own_id = config.listen_addr.to_string();
    let heartbeat_interval = config.heartbeat_interval_secs;
    let inventory = state.inventory();
    tokio::spawn(async move {
        ss::heartbeat::register_and_run(nm_addr, own_id, heartbeat_interval, inventory).await;
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .unwrap();
    tracing::info!(addr = %config.listen_addr, "ss listening");

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        let state = state.clone();
        let span = tracing::info_span!("connection", %peer);
        tokio::spawn(async move {
            use tracing::Instrument;
            ss::connection::handle(socket, peer, state).instrument(span).await;
        });
    }
}
