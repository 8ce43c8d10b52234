//! On-disk layout for a single file's state (spec §6): a main body file, a
//! `.undo` sidecar, a `.meta` sidecar, and one `.checkpoint.<tag>` directory
//! per checkpoint. These are exactly the names `protocol::validation`
//! forbids user files from taking.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FileMeta {
    pub owner: String,
    pub word_count: usize,
    pub char_count: usize,
    /// Unix seconds; `SystemTime` doesn't serialize directly and we don't
    /// need sub-second resolution for last-access bookkeeping.
    pub last_access_unix: u64,
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Resolves the folder's on-disk directory under `base_dir`. The empty
/// folder path maps to `base_dir` itself.
pub fn folder_dir(base_dir: &Path, folder: &str) -> PathBuf {
    if folder.is_empty() {
        base_dir.to_path_buf()
    } else {
        base_dir.join(folder)
    }
}

pub fn body_path(base_dir: &Path, folder: &str, name: &str) -> PathBuf {
    folder_dir(base_dir, folder).join(name)
}

pub fn undo_path(base_dir: &Path, folder: &str, name: &str) -> PathBuf {
    folder_dir(base_dir, folder).join(format!("{name}.undo"))
}

pub fn meta_path(base_dir: &Path, folder: &str, name: &str) -> PathBuf {
    folder_dir(base_dir, folder).join(format!("{name}.meta"))
}

pub fn checkpoint_dir(base_dir: &Path, folder: &str, name: &str, tag: &str) -> PathBuf {
    folder_dir(base_dir, folder).join(format!("{name}.checkpoint.{tag}"))
}

pub fn write_body(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

pub fn read_body(path: &Path) -> std::io::Result<String> {
    std::fs::read_to_string(path)
}

pub fn write_meta(path: &Path, meta: &FileMeta) -> std::io::Result<()> {
    let toml = toml::to_string_pretty(meta).map_err(std::io::Error::other)?;
    std::fs::write(path, toml)
}

pub fn read_meta(path: &Path) -> std::io::Result<FileMeta> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(std::io::Error::other)
}

pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn remove_dir_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
