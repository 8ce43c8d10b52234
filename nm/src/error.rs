//! Internal operational errors, distinct from [`protocol::ErrorCode`].
//! Mirrors `ss::error::SsError`'s one-variant-per-failure-mode shape.

use protocol::header::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::error::ProtocolError),

    #[error("no storage server is registered or ALIVE to host a new file")]
    NoSsAvailable,

    #[error("storage server {0} reported a failure materializing the file")]
    SsMaterializeFailed(String),

    #[error("username {0} is already connected")]
    UsernameTaken(String),
}

impl NmError {
    pub fn as_error_code(&self) -> ErrorCode {
        match self {
            NmError::Io(_) => ErrorCode::FileOperationFailed,
            NmError::Protocol(_) => ErrorCode::InvalidRequest,
            NmError::NoSsAvailable | NmError::SsMaterializeFailed(_) => ErrorCode::SsUnavailable,
            NmError::UsernameTaken(_) => ErrorCode::InvalidRequest,
        }
    }
}
