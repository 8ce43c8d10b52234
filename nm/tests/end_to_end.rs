//! Drives NM over real TCP with a real SS behind it (registered the same
//! way a production SS would), exercising the numbered end-to-end
//! scenarios from the protocol design.

use nm::namespace::Namespace;
use protocol::header::{ErrorCode, Header, MsgType, OpCode};
use protocol::limits::{FLAG_READ, FLAG_WRITE};
use protocol::{read_message, write_message, Message};
use ss::config::Config as SsConfig;
use ss::state::SsState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

async fn spawn_nm() -> SocketAddr {
    let ns = Arc::new(RwLock::new(Namespace::new()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (socket, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let ns = ns.clone();
            tokio::spawn(async move {
                nm::connection::handle(socket, peer, ns).await;
            });
        }
    });
    addr
}

async fn spawn_ss(nm_addr: SocketAddr) -> SocketAddr {
    let dir = tempfile::tempdir().unwrap();
    let config = SsConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        nm_addr,
        base_dir: dir.path().to_path_buf(),
        ..SsConfig::default()
    };
    let state = Arc::new(SsState::new(&config).unwrap());
    let listener = TcpListener::bind(config.listen_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let inventory = state.inventory();

    tokio::spawn(async move {
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

    tokio::spawn(ss::heartbeat::register_and_run(
        nm_addr,
        addr.to_string(),
        config.heartbeat_interval_secs,
        inventory,
    ));

    addr
}

async fn connect_client(nm_addr: SocketAddr, username: &str) -> TcpStream {
    let mut stream = TcpStream::connect(nm_addr).await.unwrap();
    let msg = Message::without_payload(Header::request(OpCode::ConnectClient, username));
    write_message(&mut stream, &msg).await.unwrap();
    let reply = read_message(&mut stream).await.unwrap();
    assert!(matches!(reply.header.msg_type, MsgType::Ack));
    stream
}

async fn roundtrip(stream: &mut TcpStream, header: Header, payload: Vec<u8>) -> Message {
    write_message(stream, &Message::new(header, payload)).await.unwrap();
    read_message(stream).await.unwrap()
}

/// Polls until NM has at least one ALIVE SS registered, since `register_and_run`
/// races against the test body on its own tokio task.
async fn wait_for_ss_registration(nm_addr: SocketAddr) {
    for i in 0..100 {
        let user = format!("probe{i}");
        let mut probe = connect_client(nm_addr, &user).await;
        let mut create = Header::request(OpCode::Create, &user);
        create.filename = format!("probe{i}.txt");
        let reply = roundtrip(&mut probe, create, Vec::new()).await;
        if matches!(reply.header.msg_type, MsgType::Ack) {
            let mut delete = Header::request(OpCode::Delete, &user);
            delete.filename = format!("probe{i}.txt");
            roundtrip(&mut probe, delete, Vec::new()).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("ss never registered with nm");
}

#[tokio::test]
async fn scenario_1_create_then_info() {
    let nm_addr = spawn_nm().await;
    spawn_ss(nm_addr).await;
    wait_for_ss_registration(nm_addr).await;

    let mut alice = connect_client(nm_addr, "alice").await;
    let mut create = Header::request(OpCode::Create, "alice");
    create.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut alice, create, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut info = Header::request(OpCode::Info, "alice");
    info.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut alice, info, Vec::new()).await;
    let body = reply.payload_str().unwrap();
    assert!(body.contains("owner=alice"));
    assert!(body.contains("words=0"));
    assert!(body.contains("chars=0"));
}

#[tokio::test]
async fn scenario_4_access_request_workflow() {
    let nm_addr = spawn_nm().await;
    spawn_ss(nm_addr).await;
    wait_for_ss_registration(nm_addr).await;

    let mut alice = connect_client(nm_addr, "alice").await;
    let mut bob = connect_client(nm_addr, "bob").await;

    let mut create = Header::request(OpCode::Create, "alice");
    create.filename = "hello.txt".to_string();
    roundtrip(&mut alice, create, Vec::new()).await;

    let mut bob_read = Header::request(OpCode::Read, "bob");
    bob_read.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut bob, bob_read.clone(), Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Error));
    assert!(matches!(reply.header.error_code, ErrorCode::PermissionDenied));

    let mut request = Header::request(OpCode::RequestAccess, "bob");
    request.filename = "hello.txt".to_string();
    request.flags = FLAG_READ;
    let reply = roundtrip(&mut bob, request, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut view = Header::request(OpCode::ViewRequests, "alice");
    view.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut alice, view, Vec::new()).await;
    assert!(reply.payload_str().unwrap().contains("bob"));

    let mut approve = Header::request(OpCode::ApproveRequest, "alice");
    approve.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut alice, approve, b"bob".to_vec()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let reply = roundtrip(&mut bob, bob_read, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Response));

    let mut bob_lock = Header::request(OpCode::Write, "bob");
    bob_lock.filename = "hello.txt".to_string();
    let reply = roundtrip(&mut bob, bob_lock, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Error));
    assert!(matches!(reply.header.error_code, ErrorCode::PermissionDenied));
}

#[tokio::test]
async fn request_access_when_already_granted_reports_current_bits() {
    let nm_addr = spawn_nm().await;
    spawn_ss(nm_addr).await;
    wait_for_ss_registration(nm_addr).await;

    let mut alice = connect_client(nm_addr, "alice").await;
    let mut create = Header::request(OpCode::Create, "alice");
    create.filename = "shared.txt".to_string();
    roundtrip(&mut alice, create, Vec::new()).await;

    let mut grant = Header::request(OpCode::AddAccess, "alice");
    grant.filename = "shared.txt".to_string();
    grant.flags = FLAG_READ | FLAG_WRITE;
    roundtrip(&mut alice, grant, b"bob".to_vec()).await;

    let mut bob = connect_client(nm_addr, "bob").await;
    let mut request = Header::request(OpCode::RequestAccess, "bob");
    request.filename = "shared.txt".to_string();
    request.flags = FLAG_READ;
    let reply = roundtrip(&mut bob, request, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Error));
    assert!(matches!(reply.header.error_code, ErrorCode::AlreadyHasAccess));
    assert_eq!(reply.header.flags, FLAG_READ | FLAG_WRITE);
}

#[tokio::test]
async fn delete_then_locate_fails() {
    let nm_addr = spawn_nm().await;
    spawn_ss(nm_addr).await;
    wait_for_ss_registration(nm_addr).await;

    let mut alice = connect_client(nm_addr, "alice").await;
    let mut create = Header::request(OpCode::Create, "alice");
    create.filename = "temp.txt".to_string();
    roundtrip(&mut alice, create, Vec::new()).await;

    let mut delete = Header::request(OpCode::Delete, "alice");
    delete.filename = "temp.txt".to_string();
    let reply = roundtrip(&mut alice, delete, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Ack));

    let mut locate = Header::request(OpCode::Read, "alice");
    locate.filename = "temp.txt".to_string();
    let reply = roundtrip(&mut alice, locate, Vec::new()).await;
    assert!(matches!(reply.header.msg_type, MsgType::Error));
    assert!(matches!(reply.header.error_code, ErrorCode::FileNotFound));
}
