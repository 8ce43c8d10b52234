//! Registration and periodic heartbeats to NM, sent over one dedicated,
//! long-lived connection (spec §4.3 "Liveness", §9 "stable ids + lookup").

use protocol::header::{Header, MsgType, OpCode};
use protocol::{read_message, write_message, Message};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Registers with NM, retrying the connect with a short backoff since NM
/// may not have started yet (both binaries are started independently).
/// `inventory` is the `(folder, name)` set this node already hosts on disk
/// at startup, carried alongside the listen address so a restarted SS
/// doesn't get placed as if it were empty (spec §4.2).
pub async fn register_and_run(
    nm_addr: SocketAddr,
    own_id: String,
    heartbeat_interval_secs: u64,
    inventory: Vec<(String, String)>,
) {
    loop {
        match TcpStream::connect(nm_addr).await {
            Ok(mut stream) => {
                let mut h = Header::request(OpCode::RegisterSs, own_id.clone());
                h.msg_type = MsgType::Request;
                let payload = encode_registration_payload(&own_id, &inventory);
                let msg = Message::new(h, payload);
                if write_message(&mut stream, &msg).await.is_err() {
                    tracing::warn!("failed to send registration, retrying");
                } else {
                    match read_message(&mut stream).await {
                        Ok(reply) if matches!(reply.header.msg_type, MsgType::Ack) => {
                            tracing::info!("registered with nm");
                            run_heartbeats(stream, &own_id, heartbeat_interval_secs).await;
                        }
                        Ok(reply) => {
                            tracing::warn!(error_code = ?reply.header.error_code, "nm rejected registration");
                        }
                        Err(e) => tracing::warn!(error = %e, "registration reply failed"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not connect to nm, retrying"),
        }
        tokio::time::sleep(Duration::from_secs(heartbeat_interval_secs.max(1))).await;
    }
}

/// First line is the listen address; each following line is one hosted
/// file as `folder/name` (or bare `name` for root-folder files).
fn encode_registration_payload(own_id: &str, inventory: &[(String, String)]) -> Vec<u8> {
    let mut lines = vec![own_id.to_string()];
    for (folder, name) in inventory {
        if folder.is_empty() {
            lines.push(name.clone());
        } else {
            lines.push(format!("{folder}/{name}"));
        }
    }
    lines.join("\n").into_bytes()
}

async fn run_heartbeats(mut stream: TcpStream, own_id: &str, interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    loop {
        ticker.tick().await;
        let msg = Message::without_payload(Header::request(OpCode::Heartbeat, own_id.to_string()));
        if write_message(&mut stream, &msg).await.is_err() {
            tracing::warn!("heartbeat send failed, nm connection lost; will re-register");
            return;
        }
        if read_message(&mut stream).await.is_err() {
            tracing::warn!("heartbeat reply failed, nm connection lost; will re-register");
            return;
        }
    }
}
