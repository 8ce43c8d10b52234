//! Per-file ACL table (spec §3 "ACL entry", §4.2 "Access control
//! algorithm"). The owner is implicitly `{read, write}` and is never
//! stored here — only non-owner grants live in this table.

use super::file::FileKey;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bits {
    pub read: bool,
    pub write: bool,
}

impl Bits {
    pub fn full() -> Self {
        Self {
            read: true,
            write: true,
        }
    }

    pub fn as_flags(&self) -> u32 {
        let mut f = 0u32;
        if self.read {
            f |= protocol::limits::FLAG_READ;
        }
        if self.write {
            f |= protocol::limits::FLAG_WRITE;
        }
        f
    }

    /// True iff `self` already grants everything `other` asks for.
    pub fn contains(&self, other: Bits) -> bool {
        (self.read || !other.read) && (self.write || !other.write)
    }
}

#[derive(Debug, Default)]
pub struct AclTable {
    entries: HashMap<(FileKey, String), Bits>,
}

impl AclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file: &FileKey, user: &str) -> Option<Bits> {
        self.entries.get(&(file.clone(), user.to_string())).copied()
    }

    pub fn grant(&mut self, file: FileKey, user: String, bits: Bits) {
        self.entries.insert((file, user), bits);
    }

    pub fn revoke(&mut self, file: &FileKey, user: &str) -> bool {
        self.entries
            .remove(&(file.clone(), user.to_string()))
            .is_some()
    }

    pub fn remove_all_for_file(&mut self, file: &FileKey) {
        self.entries.retain(|(f, _), _| f != file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FileKey {
        ("".into(), "hello.txt".into())
    }

    #[test]
    fn grant_then_get_round_trips() {
        let mut t = AclTable::new();
        t.grant(key(), "bob".into(), Bits { read: true, write: false });
        assert_eq!(
            t.get(&key(), "bob"),
            Some(Bits { read: true, write: false })
        );
    }

    #[test]
    fn revoke_removes_entry() {
        let mut t = AclTable::new();
        t.grant(key(), "bob".into(), Bits::full());
        assert!(t.revoke(&key(), "bob"));
        assert_eq!(t.get(&key(), "bob"), None);
    }

    #[test]
    fn contains_checks_superset() {
        let full = Bits::full();
        let read_only = Bits { read: true, write: false };
        assert!(full.contains(read_only));
        assert!(!read_only.contains(full));
        assert!(read_only.contains(read_only));
    }
}
