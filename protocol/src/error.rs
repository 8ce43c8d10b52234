use thiserror::Error;

/// Failures that mean the framing itself could not be parsed: a malformed
/// header, an oversize field, a payload larger than advertised limits, or a
/// connection that closed mid-message. These are distinct from the
/// application-level `ErrorCode` carried inside a well-formed `ERROR`
/// message — a `ProtocolError` always means the connection is unusable and
/// must be dropped.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed before a full message was read")]
    ConnectionClosed,

    #[error("field '{field}' exceeds its maximum of {max} bytes")]
    FieldTooLong { field: &'static str, max: usize },

    #[error("field '{field}' is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    #[error("unknown message kind tag {0}")]
    UnknownMsgType(u8),

    #[error("unknown opcode {0}")]
    UnknownOpCode(u16),

    #[error("unknown error code {0}")]
    UnknownErrorCode(u16),

    #[error("payload of {got} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { got: u32, max: u32 },
}
