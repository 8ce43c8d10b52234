//! The access-request state machine (spec §3 "Pending access request",
//! §4.2 "Access-request workflow"): `NONE -> PENDING -> {GRANTED, NONE}`,
//! with a re-request superseding any existing pending entry.

use super::acl::Bits;
use super::file::FileKey;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub user: String,
    pub wants: Bits,
    pub timestamp_unix: u64,
}

#[derive(Debug, Default)]
pub struct RequestTable {
    pending: HashMap<(FileKey, String), PendingRequest>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, file: &FileKey, user: &str) -> Option<&PendingRequest> {
        self.pending.get(&(file.clone(), user.to_string()))
    }

    /// A new request always supersedes any prior pending one for the same
    /// `(file, user)`, per spec §3's invariant.
    pub fn submit(&mut self, file: FileKey, user: String, wants: Bits, timestamp_unix: u64) {
        self.pending.insert(
            (file, user.clone()),
            PendingRequest {
                user,
                wants,
                timestamp_unix,
            },
        );
    }

    /// Removes and returns the pending request, used on approve/deny.
    pub fn take(&mut self, file: &FileKey, user: &str) -> Option<PendingRequest> {
        self.pending.remove(&(file.clone(), user.to_string()))
    }

    pub fn list_for_file(&self, file: &FileKey) -> Vec<&PendingRequest> {
        self.pending
            .iter()
            .filter(|((f, _), _)| f == file)
            .map(|(_, r)| r)
            .collect()
    }

    pub fn remove_all_for_file(&mut self, file: &FileKey) {
        self.pending.retain(|(f, _), _| f != file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FileKey {
        ("".into(), "hello.txt".into())
    }

    #[test]
    fn re_request_supersedes_prior_one() {
        let mut t = RequestTable::new();
        t.submit(key(), "bob".into(), Bits { read: true, write: false }, 1);
        t.submit(key(), "bob".into(), Bits::full(), 2);
        let r = t.get(&key(), "bob").unwrap();
        assert_eq!(r.wants, Bits::full());
        assert_eq!(r.timestamp_unix, 2);
    }

    #[test]
    fn take_clears_the_pending_entry() {
        let mut t = RequestTable::new();
        t.submit(key(), "bob".into(), Bits::full(), 1);
        assert!(t.take(&key(), "bob").is_some());
        assert!(t.get(&key(), "bob").is_none());
    }
}
