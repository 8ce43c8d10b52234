//! Per-connection task (spec §5 "Scheduling model": one logical worker
//! per accepted connection). The first message on a freshly accepted
//! socket tells NM what kind of peer it is: a client (`CONNECT_CLIENT`),
//! an SS registering (`REGISTER_SS`), or an SS's dedicated heartbeat
//! connection (`HEARTBEAT`). Everything after that is dispatched through
//! [`crate::dispatch`] on the same socket until it closes.

use crate::dispatch;
use crate::namespace::Namespace;
use protocol::header::{ErrorCode, Header, OpCode};
use protocol::{read_message, write_message, Message};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::RwLock;

pub async fn handle(socket: TcpStream, peer: SocketAddr, ns: Arc<RwLock<Namespace>>) {
    tracing::debug!(%peer, "accepted connection");
    let mut socket = socket;
    let first = match protocol::read_message(&mut socket).await {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "connection closed before first message");
            return;
        }
    };

    match first.header.op_code {
        OpCode::RegisterSs => handle_ss_registration(socket, first, ns).await,
        OpCode::Heartbeat => handle_heartbeat_connection(socket, first, ns).await,
        OpCode::ConnectClient => handle_client_connection(socket, first, ns).await,
        other => {
            tracing::warn!(?other, "first message on a new connection was not a handshake op");
            let reply = Message::without_payload(Header::error(other, ErrorCode::InvalidRequest));
            let _ = write_message(&mut socket, &reply).await;
        }
    }
}

async fn handle_client_connection(mut socket: TcpStream, first: Message, ns: Arc<RwLock<Namespace>>) {
    let username = first.header.username.clone();
    let reply = dispatch::connect_client(&ns, &username).await;
    let rejected = !matches!(reply.header.msg_type, protocol::header::MsgType::Ack);
    if write_message(&mut socket, &reply).await.is_err() || rejected {
        return;
    }

    tracing::info!(user = %username, "client connected");
    loop {
        let msg = match read_message(&mut socket).await {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(user = %username, error = %e, "client connection ended");
                break;
            }
        };
        let reply = match dispatch::handle_client_request(&ns, msg).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(user = %username, error = %e, "malformed request, dropping connection");
                break;
            }
        };
        if write_message(&mut socket, &reply).await.is_err() {
            break;
        }
    }

    dispatch::disconnect_client(&ns, &username).await;
    tracing::info!(user = %username, "client disconnected");
}

/// Registration and heartbeats share one persistent connection (the SS
/// sends `REGISTER_SS` once, then `HEARTBEAT` on a timer over the same
/// socket), so this falls through into the same loop
/// [`handle_heartbeat_connection`] uses once registration is acked.
async fn handle_ss_registration(mut socket: TcpStream, first: Message, ns: Arc<RwLock<Namespace>>) {
    let ss_id = first.header.username.clone();
    let payload = first.payload_str().unwrap_or_default();
    let mut lines = payload.lines();
    let listen_addr: SocketAddr = match lines.next().and_then(|s| s.trim().parse().ok()) {
        Some(addr) => addr,
        None => {
            let reply = Message::without_payload(Header::error(OpCode::RegisterSs, ErrorCode::InvalidRequest));
            let _ = write_message(&mut socket, &reply).await;
            return;
        }
    };
    let inventory: std::collections::HashSet<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .map(|l| match l.rfind('/') {
            Some(idx) => (l[..idx].to_string(), l[idx + 1..].to_string()),
            None => (String::new(), l.to_string()),
        })
        .collect();
    let hosted_count = inventory.len();
    let reply = dispatch::register_ss(&ns, &ss_id, listen_addr, inventory).await;
    tracing::info!(ss = %ss_id, addr = %listen_addr, hosted_count, "storage server registered");
    if write_message(&mut socket, &reply).await.is_err() {
        return;
    }
    run_heartbeat_loop(socket, &ss_id, ns).await;
}

async fn handle_heartbeat_connection(mut socket: TcpStream, first: Message, ns: Arc<RwLock<Namespace>>) {
    let ss_id = first.header.username.clone();
    let reply = dispatch::heartbeat(&ns, &ss_id).await;
    if write_message(&mut socket, &reply).await.is_err() {
        return;
    }
    run_heartbeat_loop(socket, &ss_id, ns).await;
}

async fn run_heartbeat_loop(mut socket: TcpStream, ss_id: &str, ns: Arc<RwLock<Namespace>>) {
    loop {
        let msg = match read_message(&mut socket).await {
            Ok(m) => m,
            Err(_) => break,
        };
        let reply = if matches!(msg.header.op_code, OpCode::Heartbeat) {
            dispatch::heartbeat(&ns, &msg.header.username).await
        } else {
            dispatch::unexpected_on_ss_connection(msg.header.op_code)
        };
        if write_message(&mut socket, &reply).await.is_err() {
            break;
        }
    }
    tracing::debug!(%ss_id, "heartbeat connection closed");
}
