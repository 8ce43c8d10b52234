//! Opcode dispatch for NM connections (spec §4.2, §6). One function per
//! request that takes the shared namespace plus the already-decoded
//! [`Message`], and returns the reply to send back. Connection-level
//! concerns (who is talking, SS-vs-client discrimination, disconnect
//! cleanup) live in [`crate::connection`].

use crate::namespace::{acl::Bits, now_unix, Action, Namespace};
use crate::ss_client;
use protocol::header::{ErrorCode, Header, OpCode};
use protocol::limits::{FLAG_LIST_USERS, FLAG_READ, FLAG_WRITE};
use protocol::{Message, ProtocolError};
use std::sync::Arc;
use tokio::sync::RwLock;

/// "-a" (all users) / "-l" (long form) reuse the header's flag bits on
/// `LIST`, the same way `FLAG_READ`/`FLAG_WRITE` are reused on ACL ops —
/// distinct opcodes give the bits distinct meaning.
const FLAG_ALL: u32 = 1 << 0;
const FLAG_LONG: u32 = 1 << 1;

pub async fn handle_client_request(
    ns: &Arc<RwLock<Namespace>>,
    msg: Message,
) -> Result<Message, ProtocolError> {
    let h = &msg.header;
    let op = h.op_code;
    tracing::debug!(?op, user = %h.username, "dispatching client request");

    let reply = match op {
        OpCode::View | OpCode::ViewFolder => view_folder(ns, h).await,
        OpCode::List => list_files(ns, h).await,
        OpCode::Info => info(ns, h).await,
        OpCode::CreateFolder => create_folder(ns, h).await,
        OpCode::Create => create_file(ns, h).await,
        OpCode::Delete => delete_file(ns, h).await,
        OpCode::Move => move_file(ns, h, &msg).await,
        OpCode::AddAccess => add_access(ns, h, &msg).await,
        OpCode::RemAccess => rem_access(ns, h, &msg).await,
        OpCode::RequestAccess => request_access(ns, h).await,
        OpCode::ViewRequests => view_requests(ns, h).await,
        OpCode::ApproveRequest => approve_request(ns, h, &msg).await,
        OpCode::DenyRequest => deny_request(ns, h, &msg).await,
        OpCode::Read => locate(ns, h, Action::Read).await,
        OpCode::Write => locate(ns, h, Action::Write).await,
        OpCode::Undo => locate(ns, h, Action::Write).await,
        OpCode::Stream => locate(ns, h, Action::Stream).await,
        OpCode::Exec => locate(ns, h, Action::Exec).await,
        OpCode::Checkpoint => checkpoint(ns, h, Action::CheckpointCreate).await,
        OpCode::Revert => checkpoint(ns, h, Action::CheckpointRevert).await,
        OpCode::ViewCheckpoint => view_checkpoint(ns, h).await,
        OpCode::ListCheckpoints => list_checkpoints(ns, h).await,
        other => {
            tracing::warn!(?other, "opcode not valid on a client connection");
            Err(ErrorCode::InvalidRequest)
        }
    };

    Ok(match reply {
        Ok(m) => m,
        Err((code, flags)) if flags != 0 => {
            Message::without_payload(Header::error_with_flags(op, code, flags))
        }
        Err((code, _)) => Message::without_payload(Header::error(op, code)),
    })
}

type OpResult = Result<Message, (ErrorCode, u32)>;

fn ok_ack(op: OpCode) -> OpResult {
    Ok(Message::without_payload(Header::ack(op)))
}

fn ok_response(op: OpCode, payload: String) -> OpResult {
    let bytes = payload.into_bytes();
    Ok(Message::new(Header::response(op, bytes.len() as u32), bytes))
}

fn err(code: ErrorCode) -> OpResult {
    Err((code, 0))
}

async fn view_folder(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let ns = ns.read().await;
    match ns.view_folder(&h.foldername) {
        Ok(files) => {
            let body = files
                .iter()
                .map(|f| f.name.clone())
                .collect::<Vec<_>>()
                .join("\n");
            ok_response(OpCode::View, body)
        }
        Err(code) => err(code),
    }
}

async fn list_files(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let ns = ns.read().await;
    if h.flags & FLAG_LIST_USERS != 0 {
        return ok_response(OpCode::List, ns.list_usernames().join("\n"));
    }
    let all = h.flags & FLAG_ALL != 0;
    let long = h.flags & FLAG_LONG != 0;
    let files = ns.list_all(all, &h.username);
    let body = files
        .iter()
        .map(|f| {
            if long {
                format!(
                    "{}/{} owner={} words={} chars={}",
                    f.folder, f.name, f.owner, f.word_count, f.char_count
                )
            } else {
                format!("{}/{}", f.folder, f.name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    ok_response(OpCode::List, body)
}

async fn info(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let ns = ns.read().await;
    match ns.info(&h.foldername, &h.filename) {
        Ok(rec) => ok_response(
            OpCode::Info,
            format!(
                "owner={} words={} chars={} last_access={}",
                rec.owner, rec.word_count, rec.char_count, rec.last_access_unix
            ),
        ),
        Err(code) => err(code),
    }
}

async fn create_folder(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let mut ns = ns.write().await;
    match ns.create_folder(&h.foldername, &h.username) {
        Ok(()) => ok_ack(OpCode::CreateFolder),
        Err(code) => err(code),
    }
}

async fn create_file(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let (ss_id, ss_addr) = {
        let mut ns = ns.write().await;
        let ss_id = match ns.reserve_create(&h.foldername, &h.filename, &h.username) {
            Ok(id) => id,
            Err(code) => return err(code),
        };
        let addr = ns
            .ss_registry
            .get(&ss_id)
            .map(|n| n.addr)
            .expect("just-reserved ss must be registered");
        (ss_id, addr)
    };

    match ss_client::materialize_file(ss_addr, &h.foldername, &h.filename, &h.username).await {
        Ok(()) => ok_ack(OpCode::Create),
        Err(e) => {
            tracing::warn!(error = %e, ss = %ss_id, "ss failed to materialize file, rolling back");
            ns.write().await.rollback_create(&h.foldername, &h.filename);
            err(ErrorCode::SsUnavailable)
        }
    }
}

async fn delete_file(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let ss_addr = {
        let ns = ns.read().await;
        let ss_id = match ns.begin_delete(&h.foldername, &h.filename, &h.username) {
            Ok(id) => id,
            Err(code) => return err(code),
        };
        ns.ss_registry.get(&ss_id).map(|n| n.addr)
    };
    let Some(ss_addr) = ss_addr else {
        return err(ErrorCode::SsUnavailable);
    };

    match ss_client::delete_file(ss_addr, &h.foldername, &h.filename).await {
        Ok(()) => {
            ns.write().await.commit_delete(&h.foldername, &h.filename);
            ok_ack(OpCode::Delete)
        }
        Err(e) => {
            tracing::warn!(error = %e, "ss failed to delete file, keeping namespace entry");
            err(ErrorCode::SsUnavailable)
        }
    }
}

async fn move_file(ns: &Arc<RwLock<Namespace>>, h: &Header, msg: &Message) -> OpResult {
    let dest = match msg.payload_str() {
        Ok(s) => s.trim(),
        Err(_) => return err(ErrorCode::InvalidRequest),
    };
    let mut ns = ns.write().await;
    match ns.move_file(&h.foldername, &h.filename, dest, &h.username) {
        Ok(()) => ok_ack(OpCode::Move),
        Err(code) => err(code),
    }
}

fn bits_from_flags(flags: u32) -> Bits {
    Bits {
        read: flags & FLAG_READ != 0,
        write: flags & FLAG_WRITE != 0,
    }
}

async fn add_access(ns: &Arc<RwLock<Namespace>>, h: &Header, msg: &Message) -> OpResult {
    let target = match msg.payload_str() {
        Ok(s) => s.trim(),
        Err(_) => return err(ErrorCode::InvalidRequest),
    };
    let mut ns = ns.write().await;
    match ns.grant(&h.foldername, &h.filename, &h.username, target, bits_from_flags(h.flags)) {
        Ok(()) => ok_ack(OpCode::AddAccess),
        Err(code) => err(code),
    }
}

async fn rem_access(ns: &Arc<RwLock<Namespace>>, h: &Header, msg: &Message) -> OpResult {
    let target = match msg.payload_str() {
        Ok(s) => s.trim(),
        Err(_) => return err(ErrorCode::InvalidRequest),
    };
    let mut ns = ns.write().await;
    match ns.revoke(&h.foldername, &h.filename, &h.username, target) {
        Ok(()) => ok_ack(OpCode::RemAccess),
        Err(code) => err(code),
    }
}

async fn request_access(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let mut ns = ns.write().await;
    match ns.request_access(&h.foldername, &h.filename, &h.username, bits_from_flags(h.flags)) {
        Ok(()) => ok_ack(OpCode::RequestAccess),
        Err((code, flags)) => Err((code, flags)),
    }
}

async fn view_requests(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let ns = ns.read().await;
    match ns.view_requests(&h.foldername, &h.filename, &h.username) {
        Ok(reqs) => {
            let body = reqs
                .iter()
                .map(|r| format!("{} flags={} t={}", r.user, bits_from_flags_out(r.wants), r.timestamp_unix))
                .collect::<Vec<_>>()
                .join("\n");
            ok_response(OpCode::ViewRequests, body)
        }
        Err(code) => err(code),
    }
}

fn bits_from_flags_out(bits: Bits) -> u32 {
    bits.as_flags()
}

async fn approve_request(ns: &Arc<RwLock<Namespace>>, h: &Header, msg: &Message) -> OpResult {
    let target = match msg.payload_str() {
        Ok(s) => s.trim(),
        Err(_) => return err(ErrorCode::InvalidRequest),
    };
    let mut ns = ns.write().await;
    match ns.approve_request(&h.foldername, &h.filename, &h.username, target) {
        Ok(()) => ok_ack(OpCode::ApproveRequest),
        Err(code) => err(code),
    }
}

async fn deny_request(ns: &Arc<RwLock<Namespace>>, h: &Header, msg: &Message) -> OpResult {
    let target = match msg.payload_str() {
        Ok(s) => s.trim(),
        Err(_) => return err(ErrorCode::InvalidRequest),
    };
    let mut ns = ns.write().await;
    match ns.deny_request(&h.foldername, &h.filename, &h.username, target) {
        Ok(()) => ok_ack(OpCode::DenyRequest),
        Err(code) => err(code),
    }
}

async fn locate(ns: &Arc<RwLock<Namespace>>, h: &Header, action: Action) -> OpResult {
    let ns = ns.read().await;
    match ns.locate(&h.foldername, &h.filename, &h.username, action) {
        Ok(addr) => {
            let locator = protocol::codec::encode_locator(addr);
            let op = h.op_code;
            Ok(Message::new(
                Header::response(op, locator.len() as u32),
                locator,
            ))
        }
        Err(code) => err(code),
    }
}

async fn checkpoint(ns: &Arc<RwLock<Namespace>>, h: &Header, action: Action) -> OpResult {
    let ss_addr = {
        let ns = ns.read().await;
        let key_action = if matches!(action, Action::CheckpointCreate) {
            Action::CheckpointCreate
        } else {
            Action::CheckpointRevert
        };
        if let Err(code) = ns.check_permission(
            &(h.foldername.clone(), h.filename.clone()),
            &h.username,
            key_action,
        ) {
            return err(code);
        }
        match ns.hosting_ss_addr(&h.foldername, &h.filename) {
            Ok(addr) => addr,
            Err(code) => return err(code),
        }
    };

    let result = if matches!(action, Action::CheckpointCreate) {
        ss_client::checkpoint_file(ss_addr, &h.foldername, &h.filename, &h.checkpoint_tag).await
    } else {
        ss_client::revert_file(ss_addr, &h.foldername, &h.filename, &h.checkpoint_tag).await
    };

    match result {
        Ok(()) => {
            if matches!(action, Action::CheckpointCreate) {
                ns.write().await.checkpoint_cache.insert(
                    ((h.foldername.clone(), h.filename.clone()), h.checkpoint_tag.clone()),
                    std::time::SystemTime::now(),
                );
            }
            ok_ack(h.op_code)
        }
        Err(e) => {
            tracing::warn!(error = %e, "ss rejected checkpoint/revert");
            err(ErrorCode::SsUnavailable)
        }
    }
}

async fn view_checkpoint(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let ss_addr = {
        let ns = ns.read().await;
        if let Err(code) = ns.check_permission(
            &(h.foldername.clone(), h.filename.clone()),
            &h.username,
            Action::CheckpointView,
        ) {
            return err(code);
        }
        match ns.hosting_ss_addr(&h.foldername, &h.filename) {
            Ok(addr) => addr,
            Err(code) => return err(code),
        }
    };
    match ss_client::view_checkpoint(ss_addr, &h.foldername, &h.filename, &h.checkpoint_tag).await {
        Ok(body) => ok_response(OpCode::ViewCheckpoint, body),
        Err(_) => err(ErrorCode::CheckpointNotFound),
    }
}

async fn list_checkpoints(ns: &Arc<RwLock<Namespace>>, h: &Header) -> OpResult {
    let ss_addr = {
        let ns = ns.read().await;
        if let Err(code) = ns.check_permission(
            &(h.foldername.clone(), h.filename.clone()),
            &h.username,
            Action::CheckpointList,
        ) {
            return err(code);
        }
        match ns.hosting_ss_addr(&h.foldername, &h.filename) {
            Ok(addr) => addr,
            Err(code) => return err(code),
        }
    };
    match ss_client::list_checkpoints(ss_addr, &h.foldername, &h.filename).await {
        Ok(tags) => ok_response(OpCode::ListCheckpoints, tags.join("\n")),
        Err(_) => err(ErrorCode::SsUnavailable),
    }
}

/// Handles `CONNECT_CLIENT`: registers the username as in-use for the
/// lifetime of this connection (spec §3 "Client session").
pub async fn connect_client(ns: &Arc<RwLock<Namespace>>, username: &str) -> Message {
    let mut ns = ns.write().await;
    match ns.sessions.connect(username.to_string()) {
        Ok(()) => Message::without_payload(Header::ack(OpCode::ConnectClient)),
        Err(_) => Message::without_payload(Header::error(OpCode::ConnectClient, ErrorCode::InvalidRequest)),
    }
}

pub async fn disconnect_client(ns: &Arc<RwLock<Namespace>>, username: &str) {
    ns.write().await.sessions.disconnect(username);
}

/// Handles `REGISTER_SS`: the SS's own listen address (carried in
/// `username`, spec §9's "stable ids + lookup") is also its stable id.
/// `hosted` is the file inventory the SS reported owning on disk at
/// startup, used so placement doesn't treat a restarted SS as empty
/// (spec §4.2).
pub async fn register_ss(
    ns: &Arc<RwLock<Namespace>>,
    ss_id: &str,
    listen_addr: std::net::SocketAddr,
    hosted: std::collections::HashSet<(String, String)>,
) -> Message {
    let mut ns = ns.write().await;
    ns.register_ss(crate::namespace::ss_registry::SsNode::new(
        ss_id.to_string(),
        listen_addr,
        now_unix(),
        hosted,
    ));
    Message::without_payload(Header::ack(OpCode::RegisterSs))
}

pub async fn heartbeat(ns: &Arc<RwLock<Namespace>>, ss_id: &str) -> Message {
    let mut ns = ns.write().await;
    ns.ss_registry.record_heartbeat(ss_id, now_unix());
    Message::without_payload(Header::ack(OpCode::Heartbeat))
}

pub fn unexpected_on_ss_connection(op: OpCode) -> Message {
    Message::without_payload(Header::error(op, ErrorCode::InvalidRequest))
}
