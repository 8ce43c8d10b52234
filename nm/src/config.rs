//! Name Manager configuration (spec §6 "Environment"). Same TOML-with-
//! defaults fallback as `ss::config::load_config`, grounded in the
//! teacher's `client/src/config.rs`.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// 3 missed heartbeats -> SUSPECT, this many -> DEAD (spec §4.3, §8.3).
    pub client_dead_after_missed_heartbeats: u32,
    pub heartbeat_sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9000".parse().unwrap(),
            client_dead_after_missed_heartbeats: 4,
            heartbeat_sweep_interval_secs: 5,
        }
    }
}

pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Config::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read config, using defaults");
            return Config::default();
        }
    };
    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not parse config, using defaults");
            Config::default()
        }
    }
}
