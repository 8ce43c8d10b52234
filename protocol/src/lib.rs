//! Shared wire protocol for the distributed word/sentence file service.
//!
//! Every connection — client-to-NM, client-to-SS, and NM-to-SS — speaks the
//! same fixed-header-plus-payload framing defined here. This crate has no
//! opinion on what the payload bytes mean for a given opcode; that's left to
//! `nm` and `ss`.

pub mod codec;
pub mod error;
pub mod header;
pub mod limits;
pub mod validation;

pub use codec::{read_message, write_message, Message};
pub use error::ProtocolError;
pub use header::{ErrorCode, Header, MsgType, OpCode};
pub use limits::*;
