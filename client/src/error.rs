//! Client-facing error type: either the connection/framing failed, or the
//! remote side replied with a non-`SUCCESS` `ErrorCode`. Mirrors the
//! teacher's `reqwest::Error` vs. `StatusCode` split in `api_client.rs`.

use protocol::header::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("protocol error: {0}")]
    Protocol(#[from] protocol::error::ProtocolError),

    #[error("server rejected request: {0:?}")]
    Remote(ErrorCode),

    #[error("server rejected request: {0:?} (current access: read={1} write={2})")]
    AlreadyHasAccess(ErrorCode, bool, bool),
}
