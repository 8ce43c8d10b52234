//! Per-connection task at the SS (spec §5 "Scheduling model"). Handles
//! every data-plane op on the connection's socket until it closes, then
//! releases any sentence locks the connection's user still held — the
//! "drop connection = implicit unlock" rule (spec §4.3, §5 "Cancellation").

use crate::handlers;
use crate::state::SsState;
use protocol::header::{ErrorCode, Header, OpCode};
use protocol::{read_message, write_message, Message};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;

pub async fn handle(mut socket: TcpStream, peer: SocketAddr, state: Arc<SsState>) {
    tracing::debug!(%peer, "ss accepted connection");
    let mut locked_files: HashSet<(String, String)> = HashSet::new();
    let mut holder = String::new();

    loop {
        let msg = match read_message(&mut socket).await {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "ss connection ended");
                break;
            }
        };

        if matches!(msg.header.op_code, OpCode::Stream) {
            stream_words(&mut socket, &state, &msg.header).await;
            continue;
        }

        holder = msg.header.username.clone();
        if matches!(msg.header.op_code, OpCode::SsWriteLock) {
            let key = (msg.header.foldername.clone(), msg.header.filename.clone());
            let reply = match handlers::dispatch(&state, msg).await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = %e, "malformed request, dropping connection");
                    break;
                }
            };
            if matches!(reply.header.msg_type, protocol::header::MsgType::Ack) {
                locked_files.insert(key);
            }
            if write_message(&mut socket, &reply).await.is_err() {
                break;
            }
            continue;
        }

        if matches!(msg.header.op_code, OpCode::SsWriteUnlock) {
            locked_files.remove(&(msg.header.foldername.clone(), msg.header.filename.clone()));
        }

        let reply = match handlers::dispatch(&state, msg).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "malformed request, dropping connection");
                break;
            }
        };
        if write_message(&mut socket, &reply).await.is_err() {
            break;
        }
    }

    for (folder, name) in locked_files {
        if let Some(entry) = state.registry.get(&folder, &name) {
            let released = entry.lock().release_locks_of(&holder);
            if !released.is_empty() {
                tracing::info!(%folder, %name, holder, ?released, "released locks on connection drop");
            }
        }
    }
}

async fn stream_words(socket: &mut TcpStream, state: &Arc<SsState>, h: &Header) {
    let Some(entry) = state.registry.get(&h.foldername, &h.filename) else {
        let _ = write_message(
            socket,
            &Message::without_payload(Header::error(OpCode::Stream, ErrorCode::FileNotFound)),
        )
        .await;
        return;
    };

    let words: Vec<String> = entry.lock().body.stream_words();
    for word in words {
        let bytes = word.into_bytes();
        let msg = Message::new(Header::response(OpCode::Stream, bytes.len() as u32), bytes);
        if write_message(socket, &msg).await.is_err() {
            return;
        }
    }
    let _ = write_message(socket, &Message::without_payload(Header::stop(OpCode::Stream))).await;
}
