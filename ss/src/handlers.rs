//! Opcode dispatch at the SS (spec §4.3, §6). Mirrors `nm::dispatch`'s
//! shape: one function per op, each returning the reply to send. `STREAM`
//! is the one op that doesn't fit this shape (it's many replies, not one)
//! and is handled directly in [`crate::connection`].

use crate::exec;
use crate::state::SsState;
use protocol::header::{ErrorCode, Header, OpCode};
use protocol::limits::FLAG_WRITE;
use protocol::{Message, ProtocolError};
use std::sync::Arc;

type OpResult = Result<Message, ErrorCode>;

fn ok_ack(op: OpCode) -> OpResult {
    Ok(Message::without_payload(Header::ack(op)))
}

fn ok_response(op: OpCode, payload: Vec<u8>) -> OpResult {
    Ok(Message::new(Header::response(op, payload.len() as u32), payload))
}

pub async fn dispatch(state: &Arc<SsState>, msg: Message) -> Result<Message, ProtocolError> {
    let h = &msg.header;
    let op = h.op_code;
    tracing::debug!(?op, file = %h.filename, folder = %h.foldername, "ss dispatching");

    let result = match op {
        OpCode::Create => create(state, h).await,
        OpCode::SsDelete => delete(state, h),
        OpCode::Read | OpCode::SsRead => read(state, h),
        OpCode::SsWriteLock => write_lock(state, h),
        OpCode::SsWriteWord => write_word(state, h, &msg),
        OpCode::SsWriteUnlock => write_unlock(state, h),
        OpCode::Undo => undo(state, h),
        OpCode::Exec => run_exec(state, h).await,
        OpCode::Checkpoint | OpCode::SsCheckpoint => checkpoint(state, h),
        OpCode::ViewCheckpoint => view_checkpoint(state, h),
        OpCode::Revert | OpCode::SsRevert => revert(state, h),
        OpCode::ListCheckpoints => list_checkpoints(state, h),
        other => {
            tracing::warn!(?other, "opcode not valid on the ss");
            Err(ErrorCode::InvalidRequest)
        }
    };

    Ok(match result {
        Ok(m) => m,
        Err(code) => Message::without_payload(Header::error(op, code)),
    })
}

async fn create(state: &Arc<SsState>, h: &Header) -> OpResult {
    if state.registry.contains(&h.foldername, &h.filename) {
        return Err(ErrorCode::FileExists);
    }
    let entry = crate::store::FileEntry::new_empty(
        h.foldername.clone(),
        h.filename.clone(),
        h.username.clone(),
    );
    entry
        .persist_body(&state.base_dir)
        .map_err(|_| ErrorCode::FileOperationFailed)?;
    state.registry.insert(h.foldername.clone(), h.filename.clone(), entry);
    ok_ack(OpCode::Create)
}

fn delete(state: &Arc<SsState>, h: &Header) -> OpResult {
    let Some(entry) = state.registry.remove(&h.foldername, &h.filename) else {
        return Err(ErrorCode::FileNotFound);
    };
    entry
        .lock()
        .delete_from_disk(&state.base_dir)
        .map_err(|_| ErrorCode::FileOperationFailed)?;
    ok_ack(OpCode::SsDelete)
}

fn read(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let body = entry.lock().read();
    ok_response(OpCode::Read, body.into_bytes())
}

fn write_lock(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let mut entry = entry.lock();
    let snapshot = entry.read();
    entry.write_lock(h.sentence_index, &h.username, h.flags & FLAG_WRITE != 0)?;
    let _ = entry.persist_undo(&state.base_dir, &snapshot);
    let _ = entry.persist_body(&state.base_dir);
    ok_ack(OpCode::SsWriteLock)
}

fn write_word(state: &Arc<SsState>, h: &Header, msg: &Message) -> OpResult {
    let content = protocol::codec::decode_word_payload(&msg.payload)
        .map_err(|_| ErrorCode::InvalidRequest)?;
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let mut entry = entry.lock();
    entry.write_word(h.sentence_index, &h.username, h.word_index, &content)?;
    let _ = entry.persist_body(&state.base_dir);
    ok_ack(OpCode::SsWriteWord)
}

fn write_unlock(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let mut entry = entry.lock();
    entry.write_unlock(h.sentence_index, &h.username)?;
    ok_ack(OpCode::SsWriteUnlock)
}

fn undo(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let mut entry = entry.lock();
    entry.undo(h.flags & FLAG_WRITE != 0)?;
    let _ = entry.persist_body(&state.base_dir);
    let _ = entry.clear_persisted_undo(&state.base_dir);
    ok_ack(OpCode::Undo)
}

async fn run_exec(state: &Arc<SsState>, h: &Header) -> OpResult {
    if !state.exec_enabled {
        return Err(ErrorCode::PermissionDenied);
    }
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let body = entry.lock().read();
    let output = exec::run(&body, state.exec_output_cap_bytes, state.exec_timeout_secs)
        .await
        .map_err(|_| ErrorCode::FileOperationFailed)?;
    ok_response(OpCode::Exec, output)
}

fn checkpoint(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let mut entry = entry.lock();
    entry.checkpoint(&h.checkpoint_tag, h.flags & FLAG_WRITE != 0, std::time::SystemTime::now())?;
    let _ = entry.persist_checkpoint(&state.base_dir, &h.checkpoint_tag);
    ok_ack(h.op_code)
}

fn view_checkpoint(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let body = entry.lock().view_checkpoint(&h.checkpoint_tag)?;
    ok_response(OpCode::ViewCheckpoint, body.into_bytes())
}

fn revert(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let mut entry = entry.lock();
    entry.revert(&h.checkpoint_tag, h.flags & FLAG_WRITE != 0)?;
    let _ = entry.persist_body(&state.base_dir);
    let _ = entry.clear_persisted_undo(&state.base_dir);
    ok_ack(h.op_code)
}

fn list_checkpoints(state: &Arc<SsState>, h: &Header) -> OpResult {
    let entry = state
        .registry
        .get(&h.foldername, &h.filename)
        .ok_or(ErrorCode::FileNotFound)?;
    let tags = entry.lock().list_checkpoints();
    let body = tags
        .into_iter()
        .map(|(tag, created_at)| {
            let secs = created_at
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            format!("{tag} {secs}")
        })
        .collect::<Vec<_>>()
        .join("\n");
    ok_response(OpCode::ListCheckpoints, body.into_bytes())
}
