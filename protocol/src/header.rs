//! The fixed-layout message header (spec §4.1, §6).
//!
//! Every field has a fixed on-wire width; bounded strings are stored as
//! zero-padded byte slots rather than length-prefixed, so a peer can read
//! exactly `HEADER_LEN` bytes before it knows anything else about the
//! message. All multi-byte integers are big-endian ("network order").

use crate::error::ProtocolError;
use crate::limits::{MAX_FILENAME, MAX_PATH, MAX_TAG, MAX_USERNAME};

/// What kind of message this is. A request gets exactly one of `Response`,
/// `Ack`, or `Error` back; a stream is zero-or-more `Response`s followed by
/// one `Stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Request = 0,
    Response = 1,
    Ack = 2,
    Error = 3,
    Stop = 4,
}

impl MsgType {
    fn from_u8(v: u8) -> Result<Self, ProtocolError> {
        Ok(match v {
            0 => MsgType::Request,
            1 => MsgType::Response,
            2 => MsgType::Ack,
            3 => MsgType::Error,
            4 => MsgType::Stop,
            other => return Err(ProtocolError::UnknownMsgType(other)),
        })
    }
}

/// The complete opcode taxonomy (spec §6), client/NM control-plane ops,
/// SS-to-NM reporting ops, and NM-to-SS / client-to-SS data-plane ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OpCode {
    ConnectClient = 0,
    RegisterSs = 1,
    Heartbeat = 2,
    View = 3,
    List = 4,
    Info = 5,
    Create = 6,
    Delete = 7,
    Read = 8,
    Write = 9,
    Undo = 10,
    Stream = 11,
    Exec = 12,
    AddAccess = 13,
    RemAccess = 14,
    RequestAccess = 15,
    ViewRequests = 16,
    ApproveRequest = 17,
    DenyRequest = 18,
    CreateFolder = 19,
    Move = 20,
    ViewFolder = 21,
    Checkpoint = 22,
    ViewCheckpoint = 23,
    Revert = 24,
    ListCheckpoints = 25,
    SsRead = 26,
    SsWriteLock = 27,
    SsWriteWord = 28,
    SsWriteUnlock = 29,
    SsDelete = 30,
    SsCheckpoint = 31,
    SsRevert = 32,
}

impl OpCode {
    fn from_u16(v: u16) -> Result<Self, ProtocolError> {
        use OpCode::*;
        Ok(match v {
            0 => ConnectClient,
            1 => RegisterSs,
            2 => Heartbeat,
            3 => View,
            4 => List,
            5 => Info,
            6 => Create,
            7 => Delete,
            8 => Read,
            9 => Write,
            10 => Undo,
            11 => Stream,
            12 => Exec,
            13 => AddAccess,
            14 => RemAccess,
            15 => RequestAccess,
            16 => ViewRequests,
            17 => ApproveRequest,
            18 => DenyRequest,
            19 => CreateFolder,
            20 => Move,
            21 => ViewFolder,
            22 => Checkpoint,
            23 => ViewCheckpoint,
            24 => Revert,
            25 => ListCheckpoints,
            26 => SsRead,
            27 => SsWriteLock,
            28 => SsWriteWord,
            29 => SsWriteUnlock,
            30 => SsDelete,
            31 => SsCheckpoint,
            32 => SsRevert,
            other => return Err(ProtocolError::UnknownOpCode(other)),
        })
    }
}

/// The complete error taxonomy (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    Success = 0,
    FileNotFound = 1,
    FileExists = 2,
    InvalidFilename = 3,
    InvalidIndex = 4,
    PermissionDenied = 5,
    NotOwner = 6,
    NotLockHolder = 7,
    AlreadyLocked = 8,
    NoUndoAvailable = 9,
    SsUnavailable = 10,
    NetworkError = 11,
    FileOperationFailed = 12,
    FolderNotFound = 13,
    FolderExists = 14,
    CheckpointExists = 15,
    CheckpointNotFound = 16,
    AlreadyHasAccess = 17,
    PayloadTooLarge = 18,
    InvalidRequest = 19,
}

impl ErrorCode {
    fn from_u16(v: u16) -> Result<Self, ProtocolError> {
        use ErrorCode::*;
        Ok(match v {
            0 => Success,
            1 => FileNotFound,
            2 => FileExists,
            3 => InvalidFilename,
            4 => InvalidIndex,
            5 => PermissionDenied,
            6 => NotOwner,
            7 => NotLockHolder,
            8 => AlreadyLocked,
            9 => NoUndoAvailable,
            10 => SsUnavailable,
            11 => NetworkError,
            12 => FileOperationFailed,
            13 => FolderNotFound,
            14 => FolderExists,
            15 => CheckpointExists,
            16 => CheckpointNotFound,
            17 => AlreadyHasAccess,
            18 => PayloadTooLarge,
            19 => InvalidRequest,
            other => return Err(ProtocolError::UnknownErrorCode(other)),
        })
    }
}

fn write_fixed_str(buf: &mut Vec<u8>, s: &str, max: usize, field: &'static str) -> Result<(), ProtocolError> {
    let bytes = s.as_bytes();
    if bytes.len() > max {
        return Err(ProtocolError::FieldTooLong { field, max });
    }
    let mut slot = vec![0u8; max];
    slot[..bytes.len()].copy_from_slice(bytes);
    buf.extend_from_slice(&slot);
    Ok(())
}

fn read_fixed_str(buf: &[u8], field: &'static str) -> Result<String, ProtocolError> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    std::str::from_utf8(&buf[..end])
        .map(|s| s.to_string())
        .map_err(|_| ProtocolError::InvalidUtf8 { field })
}

/// A fully decoded header. `sentence_index == -1` is the "whole file"
/// shortcut; `word_index == -1` means "replace the whole sentence".
#[derive(Debug, Clone)]
pub struct Header {
    pub msg_type: MsgType,
    pub op_code: OpCode,
    pub error_code: ErrorCode,
    pub username: String,
    pub filename: String,
    pub foldername: String,
    pub checkpoint_tag: String,
    pub sentence_index: i32,
    pub word_index: i32,
    pub flags: u32,
    pub data_length: u32,
}

/// Total on-wire size of a header, in bytes.
pub const HEADER_LEN: usize =
    1 + 2 + 2 + MAX_USERNAME + MAX_FILENAME + MAX_PATH + MAX_TAG + 4 + 4 + 4 + 4;

impl Header {
    /// Builds a bare request header; callers fill in the fields they need
    /// and leave the rest at their defaults via the `with_*` helpers.
    pub fn request(op_code: OpCode, username: impl Into<String>) -> Self {
        Self {
            msg_type: MsgType::Request,
            op_code,
            error_code: ErrorCode::Success,
            username: username.into(),
            filename: String::new(),
            foldername: String::new(),
            checkpoint_tag: String::new(),
            sentence_index: -1,
            word_index: -1,
            flags: 0,
            data_length: 0,
        }
    }

    pub fn ack(op_code: OpCode) -> Self {
        Self {
            msg_type: MsgType::Ack,
            op_code,
            error_code: ErrorCode::Success,
            username: String::new(),
            filename: String::new(),
            foldername: String::new(),
            checkpoint_tag: String::new(),
            sentence_index: -1,
            word_index: -1,
            flags: 0,
            data_length: 0,
        }
    }

    pub fn response(op_code: OpCode, data_length: u32) -> Self {
        Self {
            msg_type: MsgType::Response,
            data_length,
            ..Header::ack(op_code)
        }
    }

    pub fn stop(op_code: OpCode) -> Self {
        Self {
            msg_type: MsgType::Stop,
            ..Header::ack(op_code)
        }
    }

    pub fn error(op_code: OpCode, error_code: ErrorCode) -> Self {
        Self {
            msg_type: MsgType::Error,
            error_code,
            ..Header::ack(op_code)
        }
    }

    /// Error reply that also carries the caller's current ACL bits, used
    /// for `ALREADY_HAS_ACCESS` per spec §4.2/§7.
    pub fn error_with_flags(op_code: OpCode, error_code: ErrorCode, flags: u32) -> Self {
        Self {
            flags,
            ..Header::error(op_code, error_code)
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.push(self.msg_type as u8);
        buf.extend_from_slice(&(self.op_code as u16).to_be_bytes());
        buf.extend_from_slice(&(self.error_code as u16).to_be_bytes());
        write_fixed_str(&mut buf, &self.username, MAX_USERNAME, "username")?;
        write_fixed_str(&mut buf, &self.filename, MAX_FILENAME, "filename")?;
        write_fixed_str(&mut buf, &self.foldername, MAX_PATH, "foldername")?;
        write_fixed_str(&mut buf, &self.checkpoint_tag, MAX_TAG, "checkpoint_tag")?;
        buf.extend_from_slice(&self.sentence_index.to_be_bytes());
        buf.extend_from_slice(&self.word_index.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.data_length.to_be_bytes());
        debug_assert_eq!(buf.len(), HEADER_LEN);
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != HEADER_LEN {
            return Err(ProtocolError::ConnectionClosed);
        }
        let mut pos = 0usize;
        let msg_type = MsgType::from_u8(buf[pos])?;
        pos += 1;
        let op_code = OpCode::from_u16(u16::from_be_bytes(buf[pos..pos + 2].try_into().unwrap()))?;
        pos += 2;
        let error_code =
            ErrorCode::from_u16(u16::from_be_bytes(buf[pos..pos + 2].try_into().unwrap()))?;
        pos += 2;

        let username = read_fixed_str(&buf[pos..pos + MAX_USERNAME], "username")?;
        pos += MAX_USERNAME;
        let filename = read_fixed_str(&buf[pos..pos + MAX_FILENAME], "filename")?;
        pos += MAX_FILENAME;
        let foldername = read_fixed_str(&buf[pos..pos + MAX_PATH], "foldername")?;
        pos += MAX_PATH;
        let checkpoint_tag = read_fixed_str(&buf[pos..pos + MAX_TAG], "checkpoint_tag")?;
        pos += MAX_TAG;

        let sentence_index = i32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let word_index = i32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let flags = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let data_length = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap());

        Ok(Header {
            msg_type,
            op_code,
            error_code,
            username,
            filename,
            foldername,
            checkpoint_tag,
            sentence_index,
            word_index,
            flags,
            data_length,
        })
    }
}
