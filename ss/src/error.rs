//! Internal operational errors, distinct from [`protocol::ErrorCode`] (the
//! wire-level outcome code). Every variant maps to exactly one
//! `ErrorCode`, per spec §7: "invariant violations ... logged, fail the
//! in-flight op with `FILE_OPERATION_FAILED`, but never crash the server."

use protocol::header::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {folder}/{name}")]
    FileNotFound { folder: String, name: String },

    #[error("file already exists: {folder}/{name}")]
    FileExists { folder: String, name: String },

    #[error("subprocess exec failed: {0}")]
    ExecFailed(String),

    #[error("exec is disabled on this server")]
    ExecDisabled,
}

impl SsError {
    pub fn as_error_code(&self) -> ErrorCode {
        match self {
            SsError::Io(_) => ErrorCode::FileOperationFailed,
            SsError::FileNotFound { .. } => ErrorCode::FileNotFound,
            SsError::FileExists { .. } => ErrorCode::FileExists,
            SsError::ExecFailed(_) => ErrorCode::FileOperationFailed,
            SsError::ExecDisabled => ErrorCode::PermissionDenied,
        }
    }
}
