//! File records (spec §3 "File record"). The ACL table, pending-request
//! table, and checkpoint cache live alongside this in [`super::Namespace`],
//! keyed by the same `(folder, name)` pair, rather than embedded here —
//! that keeps each table's own invariant (at most one ACL entry per
//! `(file, user)`, etc.) enforceable locally without reaching into a
//! nested structure.

pub type FileKey = (String, String); // (folder, name)

#[derive(Debug, Clone)]
pub struct FileRecord {
    pub folder: String,
    pub name: String,
    pub owner: String,
    pub ss_id: String,
    pub word_count: usize,
    pub char_count: usize,
    pub last_access_unix: u64,
}

impl FileRecord {
    pub fn key(&self) -> FileKey {
        (self.folder.clone(), self.name.clone())
    }
}
