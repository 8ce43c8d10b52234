//! Shared SS state handed to every connection task: the file registry plus
//! the on-disk root and the EXEC gate (spec §4.3, §6).

use crate::config::Config;
use crate::store::{FileEntry, FileKey, FileRegistry};
use std::path::{Path, PathBuf};

pub struct SsState {
    pub registry: FileRegistry,
    pub base_dir: PathBuf,
    pub exec_enabled: bool,
    pub exec_output_cap_bytes: usize,
    pub exec_timeout_secs: u64,
}

impl SsState {
    pub fn new(config: &Config) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.base_dir)?;
        let registry = FileRegistry::new();
        load_existing_files(&config.base_dir, &registry)?;
        Ok(Self {
            registry,
            base_dir: config.base_dir.clone(),
            exec_enabled: config.exec_enabled,
            exec_output_cap_bytes: config.exec_output_cap_bytes,
            exec_timeout_secs: config.exec_timeout_secs,
        })
    }

    /// The `(folder, name)` pairs this node currently hosts, reported to NM
    /// at `REGISTER_SS` (spec §4.2 "register SS ... carrying listen address
    /// and initial file inventory").
    pub fn inventory(&self) -> Vec<FileKey> {
        self.registry.inventory()
    }
}

/// Rehydrates whatever files a prior run of this process left on disk.
/// Sentence locks and the undo slot are process-local and do not survive a
/// restart, but the body + metadata sidecars do (spec §6's persisted
/// layout), so a restarted SS must not serve `FILE_NOT_FOUND` for a file
/// NM still believes it hosts.
fn load_existing_files(base_dir: &Path, registry: &FileRegistry) -> std::io::Result<()> {
    walk_folder(base_dir, base_dir, "", registry)
}

fn walk_folder(base_dir: &Path, dir: &Path, folder: &str, registry: &FileRegistry) -> std::io::Result<()> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Ok(());
    };
    for dirent in read_dir.flatten() {
        let path = dirent.path();
        let Some(file_name) = dirent.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if path.is_dir() {
            if file_name.contains(".checkpoint.") {
                continue; // loaded by FileEntry::load once its owning file is found
            }
            let child_folder = if folder.is_empty() {
                file_name
            } else {
                format!("{folder}/{file_name}")
            };
            walk_folder(base_dir, &path, &child_folder, registry)?;
            continue;
        }
        if file_name.ends_with(".undo") || file_name.ends_with(".meta") || file_name.ends_with(".stats") {
            continue;
        }
        if registry.contains(folder, &file_name) {
            continue;
        }
        if let Ok(entry) = FileEntry::load(base_dir, folder.to_string(), file_name.clone()) {
            registry.insert(folder.to_string(), file_name, entry);
        }
    }
    Ok(())
}
