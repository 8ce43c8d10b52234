//! Per-sentence exclusive write locks (spec §3, §4.3 "Sentence lock
//! protocol"). Lives inside the per-file mutex, so the table itself needs
//! no further synchronization.

use std::collections::HashMap;

/// `(file, sentence_index) -> holder` is modeled here as just
/// `sentence_index -> holder`, scoped to one file's [`super::file::FileEntry`].
#[derive(Debug, Default)]
pub struct LockTable {
    holders: HashMap<i32, String>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder_of(&self, sentence: i32) -> Option<&str> {
        self.holders.get(&sentence).map(|s| s.as_str())
    }

    pub fn is_locked(&self, sentence: i32) -> bool {
        self.holders.contains_key(&sentence)
    }

    /// Grants the lock unconditionally; callers must have already checked
    /// `is_locked` under the same critical section.
    pub fn grant(&mut self, sentence: i32, holder: impl Into<String>) {
        self.holders.insert(sentence, holder.into());
    }

    pub fn release(&mut self, sentence: i32) {
        self.holders.remove(&sentence);
    }

    /// Releases every sentence currently held by `holder`. Used both for
    /// explicit `ETIRW`/`WRITE_UNLOCK` style release (single sentence) and
    /// for connection-drop cleanup, which may hold more than one sentence
    /// across the file if the protocol is ever extended to allow it; today
    /// a holder locks at most one sentence at a time but this stays
    /// conservative rather than assuming that invariant.
    pub fn release_all_held_by(&mut self, holder: &str) -> Vec<i32> {
        let sentences: Vec<i32> = self
            .holders
            .iter()
            .filter(|(_, h)| h.as_str() == holder)
            .map(|(s, _)| *s)
            .collect();
        for s in &sentences {
            self.holders.remove(s);
        }
        sentences
    }
}
