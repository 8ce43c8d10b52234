//! Client configuration (spec §6 "Environment"). Same fallback-to-default
//! shape as `nm::config`/`ss::config`, grounded in the teacher's
//! `client/src/config.rs`.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub nm_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nm_addr: "127.0.0.1:9000".parse().unwrap(),
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
