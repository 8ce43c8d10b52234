//! Named, immutable checkpoints (spec §3, §4.3). Grounded in the
//! write-tmp/fsync/rename durability discipline demonstrated by
//! `groblegark-oddjobs`'s `crates/storage/src/checkpoint.rs`, simplified to
//! this crate's per-file, in-memory-plus-sidecar-directory model (no
//! compression or background thread — each checkpoint here is small enough,
//! and the write happens synchronously inside the per-file critical
//! section, so there is no concurrent-writer hazard to hide a background
//! thread behind).

use std::collections::BTreeMap;
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub body_text: String,
    pub created_at: SystemTime,
}

/// Tag -> checkpoint, ordered so `LISTCHECKPOINTS` has a deterministic
/// enumeration order.
#[derive(Debug, Default)]
pub struct CheckpointCatalog {
    by_tag: BTreeMap<String, Checkpoint>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum CheckpointCreateError {
    AlreadyExists,
}

impl CheckpointCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        tag: &str,
        body_text: String,
        created_at: SystemTime,
    ) -> Result<(), CheckpointCreateError> {
        if self.by_tag.contains_key(tag) {
            return Err(CheckpointCreateError::AlreadyExists);
        }
        self.by_tag.insert(
            tag.to_string(),
            Checkpoint {
                body_text,
                created_at,
            },
        );
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<&Checkpoint> {
        self.by_tag.get(tag)
    }

    pub fn list(&self) -> impl Iterator<Item = (&String, &Checkpoint)> {
        self.by_tag.iter()
    }

    pub fn remove_all(&mut self) {
        self.by_tag.clear();
    }
}
