//! Storage Server configuration (spec §6 "Environment"). Grounded in the
//! teacher's `client/src/config.rs`: a TOML file with a hard-coded default
//! fallback if it's missing or malformed, so the SS always starts with
//! *some* sane configuration rather than failing at boot over a typo.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub nm_addr: SocketAddr,
    pub base_dir: PathBuf,
    pub heartbeat_interval_secs: u64,
    /// EXEC is acknowledged-dangerous (spec §4.3, §9): hardened builds
    /// should refuse it. Defaults to disabled.
    pub exec_enabled: bool,
    pub exec_output_cap_bytes: usize,
    pub exec_timeout_secs: u64,
    pub max_payload_bytes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9001".parse().unwrap(),
            nm_addr: "127.0.0.1:9000".parse().unwrap(),
            base_dir: PathBuf::from("./ss-data"),
            heartbeat_interval_secs: 5,
            exec_enabled: false,
            exec_output_cap_bytes: 64 * 1024,
            exec_timeout_secs: 5,
            max_payload_bytes: protocol::limits::MAX_PAYLOAD,
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
