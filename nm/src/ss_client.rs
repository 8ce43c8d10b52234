//! NM-to-SS RPCs: create/delete/checkpoint/revert fan-out (spec §4.2
//! "Ownership", "Deletion", "Checkpoint coordination"). Grounded in the
//! teacher's `api_client.rs` — one async function per remote operation,
//! each opening its own connection rather than holding one open, since NM
//! talks to a given SS only occasionally outside of heartbeats.

use crate::error::NmError;
use protocol::header::{ErrorCode, Header, MsgType, OpCode};
use protocol::{read_message, write_message, Message};
use std::net::SocketAddr;
use tokio::net::TcpStream;

async fn call(addr: SocketAddr, header: Header, payload: Vec<u8>) -> Result<Message, NmError> {
    let mut stream = TcpStream::connect(addr).await?;
    write_message(&mut stream, &Message::new(header, payload)).await?;
    let reply = read_message(&mut stream).await?;
    Ok(reply)
}

fn ss_header(op: OpCode, folder: &str, name: &str) -> Header {
    let mut h = Header::request(op, "nm");
    h.foldername = folder.to_string();
    h.filename = name.to_string();
    h
}

/// Asks the hosting SS to create an empty file body. Reuses the bare
/// `CREATE` opcode on the NM-to-SS hop; there is no dedicated
/// `SS_CREATE` in the wire protocol.
pub async fn materialize_file(addr: SocketAddr, folder: &str, name: &str, owner: &str) -> Result<(), NmError> {
    let mut h = ss_header(OpCode::Create, folder, name);
    h.username = owner.to_string();
    let reply = call(addr, h, Vec::new()).await?;
    ack_or_error(reply, "materialize")
}

pub async fn delete_file(addr: SocketAddr, folder: &str, name: &str) -> Result<(), NmError> {
    let h = ss_header(OpCode::SsDelete, folder, name);
    let reply = call(addr, h, Vec::new()).await?;
    ack_or_error(reply, "delete")
}

pub async fn checkpoint_file(addr: SocketAddr, folder: &str, name: &str, tag: &str) -> Result<(), NmError> {
    let mut h = ss_header(OpCode::SsCheckpoint, folder, name);
    h.checkpoint_tag = tag.to_string();
    let reply = call(addr, h, Vec::new()).await?;
    ack_or_error(reply, "checkpoint")
}

pub async fn revert_file(addr: SocketAddr, folder: &str, name: &str, tag: &str) -> Result<(), NmError> {
    let mut h = ss_header(OpCode::SsRevert, folder, name);
    h.checkpoint_tag = tag.to_string();
    let reply = call(addr, h, Vec::new()).await?;
    ack_or_error(reply, "revert")
}

/// Read-only hops reuse the bare opcode since the SS never receives these
/// directly from a client.
pub async fn view_checkpoint(addr: SocketAddr, folder: &str, name: &str, tag: &str) -> Result<String, NmError> {
    let mut h = ss_header(OpCode::ViewCheckpoint, folder, name);
    h.checkpoint_tag = tag.to_string();
    let reply = call(addr, h, Vec::new()).await?;
    match reply.header.msg_type {
        MsgType::Response => Ok(reply.payload_str()?.to_string()),
        _ => Err(error_from(&reply)),
    }
}

pub async fn list_checkpoints(addr: SocketAddr, folder: &str, name: &str) -> Result<Vec<String>, NmError> {
    let h = ss_header(OpCode::ListCheckpoints, folder, name);
    let reply = call(addr, h, Vec::new()).await?;
    match reply.header.msg_type {
        MsgType::Response => Ok(reply
            .payload_str()?
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()),
        _ => Err(error_from(&reply)),
    }
}

fn ack_or_error(reply: Message, op: &str) -> Result<(), NmError> {
    match reply.header.msg_type {
        MsgType::Ack | MsgType::Response => Ok(()),
        _ => {
            tracing::warn!(op, error = ?reply.header.error_code, "ss rejected nm-initiated rpc");
            Err(error_from(&reply))
        }
    }
}

fn error_from(reply: &Message) -> NmError {
    match reply.header.error_code {
        ErrorCode::Success => NmError::SsMaterializeFailed("unexpected non-ack reply".to_string()),
        other => NmError::SsMaterializeFailed(format!("{other:?}")),
    }
}
