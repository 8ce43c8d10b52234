//! Background liveness sweep (spec §4.3 "Liveness"): periodically advances
//! every registered SS's missed-heartbeat counter and liveness state.

use crate::namespace::now_unix;
use crate::namespace::Namespace;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub async fn run(namespace: Arc<RwLock<Namespace>>, sweep_interval_secs: u64, dead_after_missed_heartbeats: u32) {
    let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let mut ns = namespace.write().await;
        ns.ss_registry
            .sweep(now_unix(), sweep_interval_secs.max(1), dead_after_missed_heartbeats);
        tracing::debug!("liveness sweep complete");
    }
}
