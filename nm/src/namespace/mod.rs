//! The NM's single authoritative namespace (spec §3, §4.2, §5). One
//! `Namespace` lives behind `Arc<RwLock<Namespace>>`: readers (view/info/
//! locate/list) take a shared lock, mutators take an exclusive one, and
//! every multi-field mutation (e.g. approve = move pending -> ACL and
//! remove from pending) happens inside a single method so it's one
//! critical section, per spec §5.

pub mod acl;
pub mod file;
pub mod folder;
pub mod requests;
pub mod session;
pub mod ss_registry;

use acl::Bits;
use file::{FileKey, FileRecord};
use folder::Folder;
use protocol::header::ErrorCode;
use requests::PendingRequest;
use session::SessionTable;
use ss_registry::{SsNode, SsRegistry};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The operation a caller wants to perform, used by the effective-
/// permission algorithm (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    Exec,
    Stream,
    Delete,
    Grant,
    Revoke,
    Approve,
    Deny,
    ViewRequests,
    CheckpointCreate,
    CheckpointRevert,
    CheckpointView,
    CheckpointList,
}

pub struct Namespace {
    pub folders: HashMap<String, Folder>,
    pub files: HashMap<FileKey, FileRecord>,
    pub acl: acl::AclTable,
    pub requests: requests::RequestTable,
    pub sessions: SessionTable,
    pub ss_registry: SsRegistry,
    /// Cache only; the SS is authoritative for checkpoint existence (spec
    /// §4.2 "Checkpoint coordination").
    pub checkpoint_cache: HashMap<(FileKey, String), SystemTime>,
}

impl Default for Namespace {
    fn default() -> Self {
        let mut folders = HashMap::new();
        folders.insert(String::new(), Folder::root("system"));
        Self {
            folders,
            files: HashMap::new(),
            acl: acl::AclTable::new(),
            requests: requests::RequestTable::new(),
            sessions: SessionTable::new(),
            ss_registry: SsRegistry::new(),
            checkpoint_cache: HashMap::new(),
        }
    }
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Effective permission (spec §4.2) -------------------------------

    pub fn effective_bits(&self, file: &FileKey, user: &str) -> Bits {
        if let Some(rec) = self.files.get(file) {
            if rec.owner == user {
                return Bits::full();
            }
        }
        self.acl.get(file, user).unwrap_or_default()
    }

    pub fn is_owner(&self, file: &FileKey, user: &str) -> bool {
        self.files.get(file).is_some_and(|r| r.owner == user)
    }

    pub fn check_permission(&self, file: &FileKey, user: &str, action: Action) -> Result<(), ErrorCode> {
        let Some(_rec) = self.files.get(file) else {
            return Err(ErrorCode::FileNotFound);
        };
        let owner = self.is_owner(file, user);
        let bits = self.effective_bits(file, user);
        let ok = match action {
            Action::Read | Action::Exec | Action::Stream | Action::CheckpointView | Action::CheckpointList => bits.read,
            Action::Write | Action::CheckpointRevert => bits.write,
            Action::CheckpointCreate => bits.write,
            Action::Delete | Action::Grant | Action::Revoke | Action::Approve | Action::Deny | Action::ViewRequests => owner,
        };
        if ok {
            Ok(())
        } else if matches!(
            action,
            Action::Delete | Action::Grant | Action::Revoke | Action::Approve | Action::Deny | Action::ViewRequests
        ) {
            Err(ErrorCode::NotOwner)
        } else {
            Err(ErrorCode::PermissionDenied)
        }
    }

    // --- Folders ---------------------------------------------------------

    pub fn create_folder(&mut self, path: &str, owner: &str) -> Result<(), ErrorCode> {
        protocol::validation::validate_folder_path(path).map_err(|_| ErrorCode::FolderNotFound)?;
        if self.folders.contains_key(path) {
            return Err(ErrorCode::FolderExists);
        }
        let parent = protocol::validation::parent_of(path).ok_or(ErrorCode::FolderNotFound)?;
        if !self.folders.contains_key(parent) {
            return Err(ErrorCode::FolderNotFound);
        }
        self.folders.insert(
            path.to_string(),
            Folder {
                path: path.to_string(),
                owner: owner.to_string(),
                created_at: SystemTime::now(),
            },
        );
        Ok(())
    }

    pub fn view_folder(&self, path: &str) -> Result<Vec<&FileRecord>, ErrorCode> {
        if !self.folders.contains_key(path) {
            return Err(ErrorCode::FolderNotFound);
        }
        Ok(self.files.values().filter(|f| f.folder == path).collect())
    }

    // --- Files -------------------------------------------------------------

    /// Reserves the namespace slot for a new file, picking the least-loaded
    /// ALIVE SS (spec §4.2 "Placement"). Returns the chosen SS id so the
    /// caller can ask that SS to materialize the file; on SS failure the
    /// caller must call [`Namespace::rollback_create`].
    pub fn reserve_create(
        &mut self,
        folder: &str,
        name: &str,
        owner: &str,
    ) -> Result<String, ErrorCode> {
        protocol::validation::validate_filename(name).map_err(|_| ErrorCode::InvalidFilename)?;
        if !self.folders.contains_key(folder) {
            return Err(ErrorCode::FolderNotFound);
        }
        let key = (folder.to_string(), name.to_string());
        if self.files.contains_key(&key) {
            return Err(ErrorCode::FileExists);
        }
        let ss = self
            .ss_registry
            .pick_for_placement()
            .ok_or(ErrorCode::SsUnavailable)?;
        let ss_id = ss.id.clone();
        self.files.insert(
            key.clone(),
            FileRecord {
                folder: folder.to_string(),
                name: name.to_string(),
                owner: owner.to_string(),
                ss_id: ss_id.clone(),
                word_count: 0,
                char_count: 0,
                last_access_unix: now_unix(),
            },
        );
        self.ss_registry.mark_hosted(&ss_id, key);
        Ok(ss_id)
    }

    /// Undoes [`Namespace::reserve_create`] after the chosen SS failed to
    /// materialize the file (spec §7 "Partial failure on create/delete").
    pub fn rollback_create(&mut self, folder: &str, name: &str) {
        let key = (folder.to_string(), name.to_string());
        if let Some(rec) = self.files.remove(&key) {
            self.ss_registry.unmark_hosted(&rec.ss_id, &key);
        }
    }

    /// Verifies ownership and returns the hosting SS id; the caller still
    /// has to instruct that SS to wipe the body before calling
    /// [`Namespace::commit_delete`] (spec §4.2 "Deletion").
    pub fn begin_delete(&self, folder: &str, name: &str, user: &str) -> Result<String, ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, user, Action::Delete)?;
        Ok(self.files.get(&key).unwrap().ss_id.clone())
    }

    pub fn commit_delete(&mut self, folder: &str, name: &str) {
        let key = (folder.to_string(), name.to_string());
        if let Some(rec) = self.files.remove(&key) {
            self.ss_registry.unmark_hosted(&rec.ss_id, &key);
        }
        self.acl.remove_all_for_file(&key);
        self.requests.remove_all_for_file(&key);
        self.checkpoint_cache.retain(|(f, _), _| f != &key);
    }

    pub fn info(&self, folder: &str, name: &str) -> Result<&FileRecord, ErrorCode> {
        self.files
            .get(&(folder.to_string(), name.to_string()))
            .ok_or(ErrorCode::FileNotFound)
    }

    pub fn list_all(&self, all_users: bool, caller: &str) -> Vec<&FileRecord> {
        self.files
            .values()
            .filter(|f| all_users || f.owner == caller)
            .collect()
    }

    pub fn list_usernames(&self) -> Vec<String> {
        let mut owners: Vec<String> = self.files.values().map(|f| f.owner.clone()).collect();
        owners.sort();
        owners.dedup();
        owners
    }

    pub fn move_file(
        &mut self,
        folder: &str,
        name: &str,
        dest_folder: &str,
        user: &str,
    ) -> Result<(), ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, user, Action::Write)?;
        if !self.folders.contains_key(dest_folder) {
            return Err(ErrorCode::FolderNotFound);
        }
        let dest_key = (dest_folder.to_string(), name.to_string());
        if self.files.contains_key(&dest_key) {
            return Err(ErrorCode::FileExists);
        }
        let mut rec = self.files.remove(&key).unwrap();
        rec.folder = dest_folder.to_string();
        self.ss_registry.unmark_hosted(&rec.ss_id, &key);
        self.ss_registry.mark_hosted(&rec.ss_id, dest_key.clone());
        self.files.insert(dest_key, rec);

        // Neither table exposes a bulk-rekey primitive and moves are a rare
        // admin action, so existing ACL grants and pending requests on the
        // moved file are dropped rather than carried to the new key.
        self.acl.remove_all_for_file(&key);
        self.requests.remove_all_for_file(&key);
        Ok(())
    }

    // --- ACL & access requests (spec §4.2) ---------------------------------

    pub fn grant(&mut self, folder: &str, name: &str, owner: &str, target: &str, bits: Bits) -> Result<(), ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, owner, Action::Grant)?;
        self.acl.grant(key, target.to_string(), bits);
        Ok(())
    }

    pub fn revoke(&mut self, folder: &str, name: &str, owner: &str, target: &str) -> Result<(), ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, owner, Action::Revoke)?;
        self.acl.revoke(&key, target);
        Ok(())
    }

    /// `ALREADY_HAS_ACCESS` reports the caller's current bits via the
    /// error's flags field (spec §4.2, §7).
    pub fn request_access(
        &mut self,
        folder: &str,
        name: &str,
        user: &str,
        wants: Bits,
    ) -> Result<(), (ErrorCode, u32)> {
        let key = (folder.to_string(), name.to_string());
        if !self.files.contains_key(&key) {
            return Err((ErrorCode::FileNotFound, 0));
        }
        let current = self.effective_bits(&key, user);
        if current.contains(wants) {
            return Err((ErrorCode::AlreadyHasAccess, current.as_flags()));
        }
        self.requests.submit(key, user.to_string(), wants, now_unix());
        Ok(())
    }

    pub fn view_requests(&self, folder: &str, name: &str, owner: &str) -> Result<Vec<&PendingRequest>, ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, owner, Action::ViewRequests)?;
        Ok(self.requests.list_for_file(&key))
    }

    pub fn approve_request(&mut self, folder: &str, name: &str, owner: &str, target: &str) -> Result<(), ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, owner, Action::Approve)?;
        let pending = self
            .requests
            .take(&key, target)
            .ok_or(ErrorCode::InvalidRequest)?;
        self.acl.grant(key, target.to_string(), pending.wants);
        Ok(())
    }

    pub fn deny_request(&mut self, folder: &str, name: &str, owner: &str, target: &str) -> Result<(), ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, owner, Action::Deny)?;
        self.requests.take(&key, target).ok_or(ErrorCode::InvalidRequest)?;
        Ok(())
    }

    // --- Routing (spec §4.2 "Routing") --------------------------------------

    /// Checks permission for a data-path action and returns the hosting
    /// SS's address, or `SS_UNAVAILABLE` if that node is DEAD.
    pub fn locate(&self, folder: &str, name: &str, user: &str, action: Action) -> Result<std::net::SocketAddr, ErrorCode> {
        let key = (folder.to_string(), name.to_string());
        self.check_permission(&key, user, action)?;
        let rec = self.files.get(&key).ok_or(ErrorCode::FileNotFound)?;
        let ss = self
            .ss_registry
            .get(&rec.ss_id)
            .ok_or(ErrorCode::SsUnavailable)?;
        if !ss.is_usable() {
            return Err(ErrorCode::SsUnavailable);
        }
        Ok(ss.addr)
    }

    pub fn hosting_ss_addr(&self, folder: &str, name: &str) -> Result<std::net::SocketAddr, ErrorCode> {
        let rec = self
            .files
            .get(&(folder.to_string(), name.to_string()))
            .ok_or(ErrorCode::FileNotFound)?;
        self.ss_registry
            .get(&rec.ss_id)
            .map(|n| n.addr)
            .ok_or(ErrorCode::SsUnavailable)
    }

    pub fn update_counts(&mut self, folder: &str, name: &str, words: usize, chars: usize) {
        if let Some(rec) = self.files.get_mut(&(folder.to_string(), name.to_string())) {
            rec.word_count = words;
            rec.char_count = chars;
            rec.last_access_unix = now_unix();
        }
    }

    // --- SS registration ----------------------------------------------------

    pub fn register_ss(&mut self, node: SsNode) {
        self.ss_registry.register(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ss_registry::{Liveness, SsNode};
    use std::collections::HashSet;

    fn alive_ss(ns: &mut Namespace, id: &str) {
        ns.register_ss(SsNode::new(
            id.to_string(),
            "127.0.0.1:9001".parse().unwrap(),
            now_unix(),
            HashSet::new(),
        ));
    }

    #[test]
    fn create_then_delete_round_trips_namespace() {
        let mut ns = Namespace::new();
        alive_ss(&mut ns, "ss-1");
        ns.reserve_create("", "hello.txt", "alice").unwrap();
        assert!(ns.files.contains_key(&("".to_string(), "hello.txt".to_string())));
        let ss_id = ns.begin_delete("", "hello.txt", "alice").unwrap();
        assert_eq!(ss_id, "ss-1");
        ns.commit_delete("", "hello.txt");
        assert!(ns.files.is_empty());
    }

    #[test]
    fn scenario_4_request_approve_read_then_write_denied() {
        let mut ns = Namespace::new();
        alive_ss(&mut ns, "ss-1");
        ns.reserve_create("", "hello.txt", "alice").unwrap();
        let key = ("".to_string(), "hello.txt".to_string());

        assert_eq!(
            ns.check_permission(&key, "bob", Action::Read),
            Err(ErrorCode::PermissionDenied)
        );

        ns.request_access("", "hello.txt", "bob", Bits { read: true, write: false })
            .unwrap();
        assert_eq!(ns.view_requests("", "hello.txt", "alice").unwrap().len(), 1);
        ns.approve_request("", "hello.txt", "alice", "bob").unwrap();

        assert!(ns.check_permission(&key, "bob", Action::Read).is_ok());
        assert_eq!(
            ns.check_permission(&key, "bob", Action::Write),
            Err(ErrorCode::PermissionDenied)
        );
    }

    #[test]
    fn already_has_access_reports_current_bits() {
        let mut ns = Namespace::new();
        alive_ss(&mut ns, "ss-1");
        ns.reserve_create("", "hello.txt", "alice").unwrap();
        ns.grant("", "hello.txt", "alice", "bob", Bits::full()).unwrap();
        let err = ns
            .request_access("", "hello.txt", "bob", Bits { read: true, write: false })
            .unwrap_err();
        assert_eq!(err.0, ErrorCode::AlreadyHasAccess);
        assert_eq!(err.1, Bits::full().as_flags());
    }

    #[test]
    fn grant_then_revoke_denies_subsequent_write() {
        let mut ns = Namespace::new();
        alive_ss(&mut ns, "ss-1");
        ns.reserve_create("", "hello.txt", "alice").unwrap();
        ns.grant("", "hello.txt", "alice", "bob", Bits::full()).unwrap();
        ns.revoke("", "hello.txt", "alice", "bob").unwrap();
        let key = ("".to_string(), "hello.txt".to_string());
        assert_eq!(
            ns.check_permission(&key, "bob", Action::Write),
            Err(ErrorCode::PermissionDenied)
        );
    }

    #[test]
    fn locate_fails_fast_when_ss_is_dead() {
        let mut ns = Namespace::new();
        alive_ss(&mut ns, "ss-1");
        ns.reserve_create("", "hello.txt", "alice").unwrap();
        ns.ss_registry.get_mut("ss-1").unwrap().liveness = Liveness::Dead;
        assert_eq!(
            ns.locate("", "hello.txt", "alice", Action::Read),
            Err(ErrorCode::SsUnavailable)
        );
    }

    #[test]
    fn placement_rejects_with_no_alive_ss() {
        let mut ns = Namespace::new();
        assert_eq!(
            ns.reserve_create("", "hello.txt", "alice"),
            Err(ErrorCode::SsUnavailable)
        );
    }

    #[test]
    fn reserved_suffix_is_rejected_at_create() {
        let mut ns = Namespace::new();
        alive_ss(&mut ns, "ss-1");
        assert_eq!(
            ns.reserve_create("", "notes.undo", "alice"),
            Err(ErrorCode::InvalidFilename)
        );
    }
}
