//! A single file's full state: tokenized body, sentence locks, undo slot,
//! and checkpoint catalog (spec §3 "File body", §4.3). One [`FileEntry`] is
//! guarded by exactly one `parking_lot::Mutex` in [`super::registry`] —
//! everything in this type assumes its caller already holds that mutex, so
//! none of its methods take a lock themselves.

use super::body::Body;
use super::checkpoint::{CheckpointCatalog, CheckpointCreateError};
use super::lock::LockTable;
use super::persist::{self, FileMeta};
use super::undo::UndoSlot;
use protocol::header::ErrorCode;
use std::path::Path;
use std::time::SystemTime;

pub struct FileEntry {
    pub folder: String,
    pub name: String,
    pub owner: String,
    pub body: Body,
    pub locks: LockTable,
    pub undo: UndoSlot,
    pub checkpoints: CheckpointCatalog,
    pub last_access_unix: u64,
}

impl FileEntry {
    pub fn new_empty(folder: String, name: String, owner: String) -> Self {
        Self {
            folder,
            name,
            owner,
            body: Body::default(),
            locks: LockTable::new(),
            undo: UndoSlot::new(),
            checkpoints: CheckpointCatalog::new(),
            last_access_unix: persist::now_unix(),
        }
    }

    /// Loads a file's body and metadata from disk, plus any checkpoint
    /// directories discovered alongside it. Called when the SS is asked to
    /// materialize a file it already has on disk (e.g. after a restart
    /// where NM re-registers its known inventory).
    pub fn load(base_dir: &Path, folder: String, name: String) -> std::io::Result<Self> {
        let body_text = persist::read_body(&persist::body_path(base_dir, &folder, &name))?;
        let meta = persist::read_meta(&persist::meta_path(base_dir, &folder, &name))?;
        let mut entry = Self {
            folder,
            name,
            owner: meta.owner,
            body: Body::parse(&body_text),
            locks: LockTable::new(),
            undo: UndoSlot::new(),
            checkpoints: CheckpointCatalog::new(),
            last_access_unix: meta.last_access_unix,
        };
        entry.load_checkpoints_from_disk(base_dir)?;
        Ok(entry)
    }

    fn load_checkpoints_from_disk(&mut self, base_dir: &Path) -> std::io::Result<()> {
        let dir = persist::folder_dir(base_dir, &self.folder);
        let prefix = format!("{}.checkpoint.", self.name);
        let Ok(read_dir) = std::fs::read_dir(&dir) else {
            return Ok(());
        };
        for entry in read_dir.flatten() {
            let Some(fname) = entry.file_name().to_str().map(|s| s.to_string()) else {
                continue;
            };
            if let Some(tag) = fname.strip_prefix(&prefix) {
                let cp_dir = entry.path();
                if let Ok(body_text) = std::fs::read_to_string(cp_dir.join("body.txt")) {
                    let created_at = std::fs::metadata(cp_dir.join("body.txt"))
                        .and_then(|m| m.modified())
                        .unwrap_or_else(|_| SystemTime::now());
                    let _ = self.checkpoints.create(tag, body_text, created_at);
                }
            }
        }
        Ok(())
    }

    pub fn persist_body(&self, base_dir: &Path) -> std::io::Result<()> {
        let text = self.body.render();
        persist::write_body(&persist::body_path(base_dir, &self.folder, &self.name), &text)?;
        let meta = FileMeta {
            owner: self.owner.clone(),
            word_count: self.body.word_count(),
            char_count: self.body.char_count(),
            last_access_unix: self.last_access_unix,
        };
        persist::write_meta(&persist::meta_path(base_dir, &self.folder, &self.name), &meta)
    }

    pub fn persist_undo(&self, base_dir: &Path, snapshot: &str) -> std::io::Result<()> {
        persist::write_body(&persist::undo_path(base_dir, &self.folder, &self.name), snapshot)
    }

    pub fn clear_persisted_undo(&self, base_dir: &Path) -> std::io::Result<()> {
        persist::remove_if_exists(&persist::undo_path(base_dir, &self.folder, &self.name))
    }

    pub fn delete_from_disk(&self, base_dir: &Path) -> std::io::Result<()> {
        persist::remove_if_exists(&persist::body_path(base_dir, &self.folder, &self.name))?;
        persist::remove_if_exists(&persist::meta_path(base_dir, &self.folder, &self.name))?;
        persist::remove_if_exists(&persist::undo_path(base_dir, &self.folder, &self.name))?;
        for (tag, _) in self.checkpoints.list() {
            persist::remove_dir_if_exists(&persist::checkpoint_dir(
                base_dir, &self.folder, &self.name, tag,
            ))?;
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_access_unix = persist::now_unix();
    }

    pub fn read(&mut self) -> String {
        self.touch();
        self.body.render()
    }

    /// `WRITE_LOCK(file, s, u)`: spec §4.3. `caller_has_write` reflects the
    /// permission NM already verified when it issued this file's locator
    /// (spec §1 non-goal: no stronger auth than a claimed username, so the
    /// SS trusts the flag the client echoes rather than re-querying NM for
    /// every word mutation).
    pub fn write_lock(
        &mut self,
        sentence: i32,
        holder: &str,
        caller_has_write: bool,
    ) -> Result<(), ErrorCode> {
        if !caller_has_write {
            return Err(ErrorCode::PermissionDenied);
        }
        if sentence < 0 || sentence as usize > self.body.sentences.len() {
            return Err(ErrorCode::InvalidIndex);
        }
        if self.locks.is_locked(sentence) {
            return Err(ErrorCode::AlreadyLocked);
        }
        self.undo.capture(self.body.render());
        self.locks.grant(sentence, holder);
        self.touch();
        Ok(())
    }

    /// `WRITE_WORD`: spec §4.3 word-write semantics.
    pub fn write_word(
        &mut self,
        sentence: i32,
        holder: &str,
        word_index: i32,
        content: &str,
    ) -> Result<(), ErrorCode> {
        match self.locks.holder_of(sentence) {
            Some(h) if h == holder => {}
            Some(_) => return Err(ErrorCode::NotLockHolder),
            None => return Err(ErrorCode::NotLockHolder),
        }

        if word_index == -1 {
            // Replace the whole sentence's content. The payload may itself
            // tokenize into several sentences (e.g. "Hello world. Bye.");
            // all of them splice into position `s`, not just the last one.
            let reparsed = Body::parse(content);
            let idx = sentence as usize;
            if idx < self.body.sentences.len() {
                self.body.sentences.splice(idx..idx + 1, reparsed.sentences);
            } else if idx == self.body.sentences.len() {
                self.body.sentences.extend(reparsed.sentences);
            } else {
                return Err(ErrorCode::InvalidIndex);
            }
            self.touch();
            return Ok(());
        }

        if word_index < -1 {
            return Err(ErrorCode::InvalidIndex);
        }

        let Some(s) = self.body.sentence_mut(sentence) else {
            return Err(ErrorCode::InvalidIndex);
        };
        let idx = word_index as usize;
        if idx < s.words.len() {
            s.words[idx] = content.to_string();
        } else if idx == s.words.len() {
            s.words.push(content.to_string());
        } else {
            return Err(ErrorCode::InvalidIndex);
        }
        self.touch();
        Ok(())
    }

    /// `WRITE_UNLOCK` / `ETIRW`: spec §4.3.
    pub fn write_unlock(&mut self, sentence: i32, holder: &str) -> Result<(), ErrorCode> {
        match self.locks.holder_of(sentence) {
            Some(h) if h == holder => {
                self.locks.release(sentence);
                Ok(())
            }
            _ => Err(ErrorCode::NotLockHolder),
        }
    }

    /// A dropped connection implicitly releases every sentence lock its
    /// holder was carrying, with no rollback of writes already applied
    /// (spec §4.3, §5 "Cancellation").
    pub fn release_locks_of(&mut self, holder: &str) -> Vec<i32> {
        self.locks.release_all_held_by(holder)
    }

    pub fn undo(&mut self, caller_has_write: bool) -> Result<(), ErrorCode> {
        if !caller_has_write {
            return Err(ErrorCode::PermissionDenied);
        }
        match self.undo.take() {
            Some(snapshot) => {
                self.body = Body::parse(&snapshot);
                self.touch();
                Ok(())
            }
            None => Err(ErrorCode::NoUndoAvailable),
        }
    }

    pub fn checkpoint(
        &mut self,
        tag: &str,
        caller_has_write: bool,
        now: SystemTime,
    ) -> Result<(), ErrorCode> {
        if !caller_has_write {
            return Err(ErrorCode::PermissionDenied);
        }
        self.checkpoints
            .create(tag, self.body.render(), now)
            .map_err(|e| match e {
                CheckpointCreateError::AlreadyExists => ErrorCode::CheckpointExists,
            })
    }

    pub fn view_checkpoint(&self, tag: &str) -> Result<String, ErrorCode> {
        self.checkpoints
            .get(tag)
            .map(|c| c.body_text.clone())
            .ok_or(ErrorCode::CheckpointNotFound)
    }

    /// `REVERT`: atomically replaces the current body and clears the undo
    /// snapshot. Per spec §9, this does not invalidate any checkpoint,
    /// including the one just reverted to — they live in
    /// [`CheckpointCatalog`], untouched by this call.
    pub fn revert(&mut self, tag: &str, caller_has_write: bool) -> Result<(), ErrorCode> {
        if !caller_has_write {
            return Err(ErrorCode::PermissionDenied);
        }
        let text = self
            .checkpoints
            .get(tag)
            .map(|c| c.body_text.clone())
            .ok_or(ErrorCode::CheckpointNotFound)?;
        self.body = Body::parse(&text);
        self.undo.clear();
        self.touch();
        Ok(())
    }

    pub fn list_checkpoints(&self) -> Vec<(String, SystemTime)> {
        self.checkpoints
            .list()
            .map(|(tag, cp)| (tag.clone(), cp.created_at))
            .collect()
    }

    pub fn persist_checkpoint(&self, base_dir: &Path, tag: &str) -> std::io::Result<()> {
        let dir = persist::checkpoint_dir(base_dir, &self.folder, &self.name, tag);
        std::fs::create_dir_all(&dir)?;
        let body = self
            .checkpoints
            .get(tag)
            .map(|c| c.body_text.clone())
            .unwrap_or_default();
        std::fs::write(dir.join("body.txt"), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> FileEntry {
        FileEntry::new_empty("".into(), "hello.txt".into(), "alice".into())
    }

    #[test]
    fn scenario_2_lock_write_unlock_read() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", -1, "Hello world. Bye.").unwrap();
        f.write_unlock(0, "alice").unwrap();
        assert_eq!(f.read(), "Hello world. Bye.");
        assert_eq!(f.body.word_count(), 3);
        assert_eq!(f.body.char_count(), "Hello world. Bye.".chars().count());
    }

    #[test]
    fn second_locker_gets_already_locked() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        assert_eq!(f.write_lock(0, "bob", true), Err(ErrorCode::AlreadyLocked));
    }

    #[test]
    fn mismatched_holder_cannot_write_word() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        assert_eq!(
            f.write_word(0, "bob", 0, "x"),
            Err(ErrorCode::NotLockHolder)
        );
    }

    #[test]
    fn lock_then_unlock_with_no_writes_is_a_noop_and_undo_is_a_noop() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", -1, "Hello world.").unwrap();
        f.write_unlock(0, "alice").unwrap();
        let before = f.read();

        f.write_lock(0, "alice", true).unwrap();
        f.write_unlock(0, "alice").unwrap();
        assert_eq!(f.read(), before);

        f.undo(true).unwrap();
        assert_eq!(f.read(), before);
    }

    #[test]
    fn undo_reverts_to_state_at_preceding_lock() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", -1, "Hello world. Bye.").unwrap();
        f.write_unlock(0, "alice").unwrap();

        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", 0, "Hi").unwrap();
        f.write_unlock(0, "alice").unwrap();
        assert_eq!(f.read(), "Hi world. Bye.");

        f.undo(true).unwrap();
        assert_eq!(f.read(), "Hello world. Bye.");
    }

    #[test]
    fn undo_without_snapshot_fails() {
        let mut f = entry();
        assert_eq!(f.undo(true), Err(ErrorCode::NoUndoAvailable));
    }

    #[test]
    fn checkpoint_then_revert_restores_byte_exact_body() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", -1, "Hello world. Bye.").unwrap();
        f.write_unlock(0, "alice").unwrap();
        f.checkpoint("v1", true, SystemTime::now()).unwrap();

        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", 0, "Hi").unwrap();
        f.write_unlock(0, "alice").unwrap();
        assert_eq!(f.read(), "Hi world. Bye.");

        f.revert("v1", true).unwrap();
        assert_eq!(f.read(), "Hello world. Bye.");
    }

    #[test]
    fn append_word_when_index_equals_length() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", -1, "Hello world.").unwrap();
        f.write_word(0, "alice", 2, "there").unwrap();
        f.write_unlock(0, "alice").unwrap();
        assert_eq!(f.read(), "Hello world there.");
    }

    #[test]
    fn invalid_word_index_is_rejected() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", -1, "Hello world.").unwrap();
        assert_eq!(
            f.write_word(0, "alice", 5, "oops"),
            Err(ErrorCode::InvalidIndex)
        );
    }

    #[test]
    fn sentence_index_past_end_is_rejected() {
        let mut f = entry();
        assert_eq!(f.write_lock(5, "alice", true), Err(ErrorCode::InvalidIndex));
    }

    #[test]
    fn disconnect_mid_write_retains_partial_mutation_and_keeps_undo() {
        let mut f = entry();
        f.write_lock(0, "alice", true).unwrap();
        f.write_word(0, "alice", -1, "Hello world.").unwrap();
        // simulate a dropped connection instead of an explicit ETIRW
        let released = f.release_locks_of("alice");
        assert_eq!(released, vec![0]);
        assert_eq!(f.read(), "Hello world.");
        assert!(f.undo.is_available());
    }
}
