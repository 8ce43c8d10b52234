//! Async client for the distributed file service. One function per
//! operation, each opening or reusing a TCP connection and returning a
//! parsed result — the same shape as the teacher's `api_client.rs`, with
//! the custom TCP framing standing in for `reqwest`.

use crate::error::ClientError;
use protocol::header::{ErrorCode, Header, MsgType, OpCode};
use protocol::limits::{FLAG_LIST_USERS, FLAG_READ, FLAG_WRITE};
use protocol::{read_message, write_message, Message};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// One persistent session to NM (spec §4.1 "a client opens one persistent
/// TCP session to NM for control/metadata").
pub struct NmConn {
    stream: TcpStream,
    username: String,
}

impl NmConn {
    pub async fn connect(nm_addr: SocketAddr, username: impl Into<String>) -> Result<Self, ClientError> {
        let username = username.into();
        let mut stream = TcpStream::connect(nm_addr).await?;
        let msg = Message::without_payload(Header::request(OpCode::ConnectClient, username.clone()));
        write_message(&mut stream, &msg).await?;
        let reply = read_message(&mut stream).await?;
        expect_ack(reply)?;
        Ok(Self { stream, username })
    }

    async fn call(&mut self, header: Header, payload: Vec<u8>) -> Result<Message, ClientError> {
        write_message(&mut self.stream, &Message::new(header, payload)).await?;
        Ok(read_message(&mut self.stream).await?)
    }

    fn request(&self, op: OpCode) -> Header {
        Header::request(op, self.username.clone())
    }

    pub async fn list_files(&mut self, all: bool, long: bool) -> Result<Vec<String>, ClientError> {
        let mut h = self.request(OpCode::List);
        h.flags = (all as u32) | ((long as u32) << 1);
        let reply = self.call(h, Vec::new()).await?;
        Ok(lines_of(expect_response(reply)?))
    }

    /// `list users` (spec §4.2): a distinct NM operation from `list files`,
    /// sharing the `LIST` opcode via a dedicated flag bit.
    pub async fn list_users(&mut self) -> Result<Vec<String>, ClientError> {
        let mut h = self.request(OpCode::List);
        h.flags = FLAG_LIST_USERS;
        let reply = self.call(h, Vec::new()).await?;
        Ok(lines_of(expect_response(reply)?))
    }

    pub async fn view_folder(&mut self, folder: &str) -> Result<Vec<String>, ClientError> {
        let mut h = self.request(OpCode::ViewFolder);
        h.foldername = folder.to_string();
        let reply = self.call(h, Vec::new()).await?;
        Ok(lines_of(expect_response(reply)?))
    }

    pub async fn info(&mut self, folder: &str, name: &str) -> Result<String, ClientError> {
        let mut h = self.request(OpCode::Info);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        let reply = self.call(h, Vec::new()).await?;
        Ok(expect_response(reply)?)
    }

    pub async fn create_folder(&mut self, path: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::CreateFolder);
        h.foldername = path.to_string();
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn create_file(&mut self, folder: &str, name: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::Create);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn delete_file(&mut self, folder: &str, name: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::Delete);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn move_file(&mut self, folder: &str, name: &str, dest: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::Move);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        expect_ack(self.call(h, dest.as_bytes().to_vec()).await?)
    }

    pub async fn grant_access(
        &mut self,
        folder: &str,
        name: &str,
        target: &str,
        read: bool,
        write: bool,
    ) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::AddAccess);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.flags = flags(read, write);
        expect_ack(self.call(h, target.as_bytes().to_vec()).await?)
    }

    pub async fn revoke_access(&mut self, folder: &str, name: &str, target: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::RemAccess);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        expect_ack(self.call(h, target.as_bytes().to_vec()).await?)
    }

    pub async fn request_access(
        &mut self,
        folder: &str,
        name: &str,
        read: bool,
        write: bool,
    ) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::RequestAccess);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.flags = flags(read, write);
        let reply = self.call(h, Vec::new()).await?;
        match reply.header.msg_type {
            MsgType::Ack => Ok(()),
            MsgType::Error if matches!(reply.header.error_code, ErrorCode::AlreadyHasAccess) => {
                Err(ClientError::AlreadyHasAccess(
                    ErrorCode::AlreadyHasAccess,
                    reply.header.flags & FLAG_READ != 0,
                    reply.header.flags & FLAG_WRITE != 0,
                ))
            }
            _ => Err(ClientError::Remote(reply.header.error_code)),
        }
    }

    pub async fn view_requests(&mut self, folder: &str, name: &str) -> Result<Vec<String>, ClientError> {
        let mut h = self.request(OpCode::ViewRequests);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        let reply = self.call(h, Vec::new()).await?;
        Ok(lines_of(expect_response(reply)?))
    }

    pub async fn approve_request(&mut self, folder: &str, name: &str, target: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::ApproveRequest);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        expect_ack(self.call(h, target.as_bytes().to_vec()).await?)
    }

    pub async fn deny_request(&mut self, folder: &str, name: &str, target: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::DenyRequest);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        expect_ack(self.call(h, target.as_bytes().to_vec()).await?)
    }

    pub async fn checkpoint(&mut self, folder: &str, name: &str, tag: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::Checkpoint);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.checkpoint_tag = tag.to_string();
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn view_checkpoint(&mut self, folder: &str, name: &str, tag: &str) -> Result<String, ClientError> {
        let mut h = self.request(OpCode::ViewCheckpoint);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.checkpoint_tag = tag.to_string();
        Ok(expect_response(self.call(h, Vec::new()).await?)?)
    }

    pub async fn revert(&mut self, folder: &str, name: &str, tag: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::Revert);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.checkpoint_tag = tag.to_string();
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn list_checkpoints(&mut self, folder: &str, name: &str) -> Result<Vec<String>, ClientError> {
        let mut h = self.request(OpCode::ListCheckpoints);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        let reply = self.call(h, Vec::new()).await?;
        Ok(lines_of(expect_response(reply)?))
    }

    /// Locates the SS hosting `name`, verifying the given op's permission
    /// server-side (spec §4.2 "Routing").
    pub async fn locate(&mut self, folder: &str, name: &str, op: OpCode) -> Result<SocketAddr, ClientError> {
        let mut h = self.request(op);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        let reply = self.call(h, Vec::new()).await?;
        let locator = expect_response(reply)?;
        locator
            .parse()
            .map_err(|_| ClientError::Remote(ErrorCode::NetworkError))
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// A fresh, single-purpose session to an SS for one data-path operation
/// (spec §4.1: "the client opens a fresh TCP session to that SS").
pub struct SsConn {
    stream: TcpStream,
    username: String,
}

impl SsConn {
    pub async fn connect(addr: SocketAddr, username: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            stream: TcpStream::connect(addr).await?,
            username: username.into(),
        })
    }

    async fn call(&mut self, header: Header, payload: Vec<u8>) -> Result<Message, ClientError> {
        write_message(&mut self.stream, &Message::new(header, payload)).await?;
        Ok(read_message(&mut self.stream).await?)
    }

    fn request(&self, op: OpCode) -> Header {
        Header::request(op, self.username.clone())
    }

    pub async fn read(&mut self, folder: &str, name: &str) -> Result<String, ClientError> {
        let mut h = self.request(OpCode::SsRead);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        Ok(expect_response(self.call(h, Vec::new()).await?)?)
    }

    /// Grants write permission in `flags` since the SS trusts the caller's
    /// claimed bits rather than re-querying NM per word mutation (spec §1
    /// non-goal: no stronger auth than a claimed username).
    pub async fn write_lock(&mut self, folder: &str, name: &str, sentence: i32) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::SsWriteLock);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.sentence_index = sentence;
        h.flags = FLAG_WRITE;
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn write_word(
        &mut self,
        folder: &str,
        name: &str,
        sentence: i32,
        word_index: i32,
        content: &str,
    ) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::SsWriteWord);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.sentence_index = sentence;
        h.word_index = word_index;
        let payload = protocol::codec::encode_word_payload(content);
        expect_ack(self.call(h, payload).await?)
    }

    pub async fn write_unlock(&mut self, folder: &str, name: &str, sentence: i32) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::SsWriteUnlock);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.sentence_index = sentence;
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn undo(&mut self, folder: &str, name: &str) -> Result<(), ClientError> {
        let mut h = self.request(OpCode::Undo);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.flags = FLAG_WRITE;
        expect_ack(self.call(h, Vec::new()).await?)
    }

    pub async fn exec(&mut self, folder: &str, name: &str) -> Result<Vec<u8>, ClientError> {
        let mut h = self.request(OpCode::Exec);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        h.flags = FLAG_READ;
        let reply = self.call(h, Vec::new()).await?;
        match reply.header.msg_type {
            MsgType::Response => Ok(reply.payload),
            _ => Err(ClientError::Remote(reply.header.error_code)),
        }
    }

    /// Issues `STREAM` and reads `RESPONSE`s until `STOP` (spec §4.3).
    pub async fn stream(&mut self, folder: &str, name: &str) -> Result<Vec<String>, ClientError> {
        let mut h = self.request(OpCode::Stream);
        h.foldername = folder.to_string();
        h.filename = name.to_string();
        write_message(&mut self.stream, &Message::without_payload(h)).await?;

        let mut words = Vec::new();
        loop {
            let msg = read_message(&mut self.stream).await?;
            match msg.header.msg_type {
                MsgType::Response => words.push(msg.payload_str()?.to_string()),
                MsgType::Stop => break,
                MsgType::Error => return Err(ClientError::Remote(msg.header.error_code)),
                _ => break,
            }
        }
        Ok(words)
    }
}

fn flags(read: bool, write: bool) -> u32 {
    (read as u32) | ((write as u32) << 1)
}

fn lines_of(s: String) -> Vec<String> {
    s.lines().filter(|l| !l.is_empty()).map(str::to_string).collect()
}

fn expect_ack(msg: Message) -> Result<(), ClientError> {
    match msg.header.msg_type {
        MsgType::Ack => Ok(()),
        MsgType::Error => Err(ClientError::Remote(msg.header.error_code)),
        _ => Err(ClientError::Remote(ErrorCode::InvalidRequest)),
    }
}

fn expect_response(msg: Message) -> Result<String, ClientError> {
    match msg.header.msg_type {
        MsgType::Response => Ok(msg.payload_str()?.to_string()),
        MsgType::Error => Err(ClientError::Remote(msg.header.error_code)),
        _ => Err(ClientError::Remote(ErrorCode::InvalidRequest)),
    }
}
