//! End-to-end tests against a real SS listener over TCP, exercising the
//! numbered scenarios from the file-body section of the protocol design.

use protocol::header::{ErrorCode, Header, MsgType, OpCode};
use protocol::limits::{FLAG_READ, FLAG_WRITE};
use protocol::{read_message, write_message, Message};
use ss::config::Config;
use ss::state::SsState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

async fn spawn_ss() -> SocketAddr {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        base_dir: dir.path().to_path_buf(),
        exec_enabled: true,
        ..Config::default()
    };
    let state = Arc::new(SsState::new(&config).unwrap());
    let listener = TcpListener::bind(config.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        // keep the tempdir alive for the lifetime of the server task
        let _dir = dir;
        loop {
            let (socket, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let state = state.clone();
            tokio::spawn(async move {
                ss::connection::handle(socket, peer, state).await;
            });
        }
    });
    addr
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.unwrap()
}

async fn roundtrip(stream: &mut TcpStream, header: Header, payload: Vec<u8>) -> Message {
    write_message(stream, &Message::new(header, payload)).await.unwrap();
    read_message(stream).await.unwrap()
}

fn create_msg(username: &str, name: &str) -> Header {
    let mut h = Header::request(OpCode::Create, username);
    h.filename = name.to_string();
    h
}

#[tokio::test]
async fn scenario_2_lock_write_unlock_read() {
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;

    let reply = roundtrip(&mut stream, create_msg("alice", "hello.txt"), Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut lock = Header::request(OpCode::SsWriteLock, "alice");
    lock.filename = "hello.txt".to_string();
    lock.sentence_index = 0;
    lock.flags = FLAG_WRITE;
    let reply = roundtrip(&mut stream, lock, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut write = Header::request(OpCode::SsWriteWord, "alice");
    write.filename = "hello.txt".to_string();
    write.sentence_index = 0;
    write.word_index = -1;
    let payload = protocol::codec::encode_word_payload("Hello world. Bye.");
    let reply = roundtrip(&mut stream, write, payload).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut unlock = Header::request(OpCode::SsWriteUnlock, "alice");
    unlock.filename = "hello.txt".to_string();
    unlock.sentence_index = 0;
    let reply = roundtrip(&mut stream, unlock, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut read = Header::request(OpCode::SsRead, "alice");
    read.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut stream, read, Vec::new()).await;
    assert_eq!(reply.payload_str().unwrap(), "Hello world. Bye.");
}

#[tokio::test]
async fn scenario_3_checkpoint_then_revert() {
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;
    roundtrip(&mut stream, create_msg("alice", "hello.txt"), Vec::new()).await;

    async fn lock_write_unlock(stream: &mut TcpStream, content: &str, word_index: i32) {
        let mut lock = Header::request(OpCode::SsWriteLock, "alice");
        lock.filename = "hello.txt".to_string();
        lock.flags = FLAG_WRITE;
        roundtrip(stream, lock, Vec::new()).await;

        let mut write = Header::request(OpCode::SsWriteWord, "alice");
        write.filename = "hello.txt".to_string();
        write.word_index = word_index;
        let payload = protocol::codec::encode_word_payload(content);
        roundtrip(stream, write, payload).await;

        let mut unlock = Header::request(OpCode::SsWriteUnlock, "alice");
        unlock.filename = "hello.txt".to_string();
        roundtrip(stream, unlock, Vec::new()).await;
    }

    lock_write_unlock(&mut stream, "Hello world. Bye.", -1).await;

    let mut cp = Header::request(OpCode::SsCheckpoint, "alice");
    cp.filename = "hello.txt".to_string();
    cp.checkpoint_tag = "v1".to_string();
    cp.flags = FLAG_WRITE;
    let reply = roundtrip(&mut stream, cp, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    lock_write_unlock(&mut stream, "Hi", 0).await;

    let mut read = Header::request(OpCode::SsRead, "alice");
    read.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut stream, read, Vec::new()).await;
    assert_eq!(reply.payload_str().unwrap(), "Hi world. Bye.");

    let mut revert = Header::request(OpCode::SsRevert, "alice");
    revert.filename = "hello.txt".to_string();
    revert.checkpoint_tag = "v1".to_string();
    revert.flags = FLAG_WRITE;
    let reply = roundtrip(&mut stream, revert, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut read = Header::request(OpCode::SsRead, "alice");
    read.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut stream, read, Vec::new()).await;
    assert_eq!(reply.payload_str().unwrap(), "Hello world. Bye.");
}

#[tokio::test]
async fn scenario_5_contended_lock_freed_on_disconnect() {
    let addr = spawn_ss().await;
    let mut a = connect(addr).await;
    roundtrip(&mut a, create_msg("alice", "hello.txt"), Vec::new()).await;

    let mut lock = Header::request(OpCode::SsWriteLock, "alice");
    lock.filename = "hello.txt".to_string();
    lock.flags = FLAG_WRITE;
    let reply = roundtrip(&mut a, lock.clone(), Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut b = connect(addr).await;
    let reply = roundtrip(&mut b, lock.clone(), Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Error));
    assert!(matches!(reply.header.error_code, ErrorCode::AlreadyLocked));

    drop(a);
    // give the ss's connection task a moment to notice the drop and release
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let reply = roundtrip(&mut b, lock, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));
}

#[tokio::test]
async fn scenario_6_stream_emits_words_in_order_then_stop() {
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;
    roundtrip(&mut stream, create_msg("alice", "hello.txt"), Vec::new()).await;

    let mut lock = Header::request(OpCode::SsWriteLock, "alice");
    lock.filename = "hello.txt".to_string();
    lock.flags = FLAG_WRITE;
    roundtrip(&mut stream, lock, Vec::new()).await;
    let mut write = Header::request(OpCode::SsWriteWord, "alice");
    write.filename = "hello.txt".to_string();
    write.word_index = -1;
    let payload = protocol::codec::encode_word_payload("Hello world. Bye.");
    roundtrip(&mut stream, write, payload).await;
    let mut unlock = Header::request(OpCode::SsWriteUnlock, "alice");
    unlock.filename = "hello.txt".to_string();
    roundtrip(&mut stream, unlock, Vec::new()).await;

    let mut stream_req = Header::request(OpCode::Stream, "alice");
    stream_req.filename = "hello.txt".to_string();
    write_message(&mut stream, &Message::without_payload(stream_req)).await.unwrap();

    let mut words = Vec::new();
    loop {
        let msg = read_message(&mut stream).await.unwrap();
        match msg.header.msg_type {
            MsgType::Response => words.push(msg.payload_str().unwrap().to_string()),
            MsgType::Stop => break,
            other => panic!("unexpected message type in stream: {other:?}"),
        }
    }
    assert_eq!(words, vec!["Hello", "world.", "Bye."]);
}

#[tokio::test]
async fn undo_reverts_to_preceding_lock_grant() {
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;
    roundtrip(&mut stream, create_msg("alice", "hello.txt"), Vec::new()).await;

    let mut lock = Header::request(OpCode::SsWriteLock, "alice");
    lock.filename = "hello.txt".to_string();
    lock.flags = FLAG_WRITE;
    roundtrip(&mut stream, lock.clone(), Vec::new()).await;
    let mut write = Header::request(OpCode::SsWriteWord, "alice");
    write.filename = "hello.txt".to_string();
    write.word_index = -1;
    let payload = protocol::codec::encode_word_payload("Hello world. Bye.");
    roundtrip(&mut stream, write, payload).await;
    let mut unlock = Header::request(OpCode::SsWriteUnlock, "alice");
    unlock.filename = "hello.txt".to_string();
    roundtrip(&mut stream, unlock, Vec::new()).await;

    roundtrip(&mut stream, lock, Vec::new()).await;
    let mut write2 = Header::request(OpCode::SsWriteWord, "alice");
    write2.filename = "hello.txt".to_string();
    write2.word_index = 0;
    let payload = protocol::codec::encode_word_payload("Hi");
    roundtrip(&mut stream, write2, payload).await;

    let mut undo = Header::request(OpCode::Undo, "alice");
    undo.filename = "hello.txt".to_string();
    undo.flags = FLAG_WRITE;
    let reply = roundtrip(&mut stream, undo, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut read = Header::request(OpCode::SsRead, "alice");
    read.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut stream, read, Vec::new()).await;
    assert_eq!(reply.payload_str().unwrap(), "Hello world. Bye.");
}

#[tokio::test]
async fn read_without_permission_is_denied() {
    // SS trusts the caller's claimed flags (no ACL state of its own), so
    // "denied" here means the caller never sets FLAG_READ on a write-gated op.
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;
    roundtrip(&mut stream, create_msg("alice", "hello.txt"), Vec::new()).await;

    let mut lock = Header::request(OpCode::SsWriteLock, "bob");
    lock.filename = "hello.txt".to_string();
    // FLAG_WRITE intentionally left unset
    let reply = roundtrip(&mut stream, lock, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Error));
    assert!(matches!(reply.header.error_code, ErrorCode::PermissionDenied));
}

#[tokio::test]
async fn empty_file_read_returns_empty_string() {
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;
    roundtrip(&mut stream, create_msg("alice", "empty.txt"), Vec::new()).await;

    let mut read = Header::request(OpCode::SsRead, "alice");
    read.filename = "empty.txt".to_string();
    let reply = roundtrip(&mut stream, read, Vec::new()).await;
    assert_eq!(reply.payload_str().unwrap(), "");
}

#[tokio::test]
async fn sentence_index_past_end_is_invalid() {
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;
    roundtrip(&mut stream, create_msg("alice", "hello.txt"), Vec::new()).await;

    let mut lock = Header::request(OpCode::SsWriteLock, "alice");
    lock.filename = "hello.txt".to_string();
    lock.sentence_index = 3;
    lock.flags = FLAG_WRITE;
    let reply = roundtrip(&mut stream, lock, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Error));
    assert!(matches!(reply.header.error_code, ErrorCode::InvalidIndex));
}

#[tokio::test]
async fn exec_returns_response_when_enabled() {
    let addr = spawn_ss().await;
    let mut stream = connect(addr).await;
    roundtrip(&mut stream, create_msg("alice", "script.txt"), Vec::new()).await;

    let mut exec = Header::request(OpCode::Exec, "alice");
    exec.filename = "script.txt".to_string();
    exec.flags = FLAG_READ;
    let reply = roundtrip(&mut stream, exec, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Response));
}
