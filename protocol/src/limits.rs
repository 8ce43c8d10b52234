//! Fixed bounds for the header's string slots and the payload.
//!
//! These are "implementation-chosen but fixed" per spec §4.1: the header
//! layout is constant for the lifetime of the protocol version, so every
//! peer agrees on `HEADER_LEN` without a negotiation step.

/// Maximum length, in bytes, of a username.
pub const MAX_USERNAME: usize = 32;
/// Maximum length, in bytes, of a file's base name.
pub const MAX_FILENAME: usize = 128;
/// Maximum length, in bytes, of a folder path.
pub const MAX_PATH: usize = 256;
/// Maximum length, in bytes, of a checkpoint tag.
pub const MAX_TAG: usize = 64;

/// Upper bound on a single message payload. Requests over this are rejected
/// with `PAYLOAD_TOO_LARGE` before any buffer is allocated (spec §5).
pub const MAX_PAYLOAD: u32 = 16 * 1024 * 1024;

/// Flag bit for read permission within `Header::flags`.
pub const FLAG_READ: u32 = 1 << 0;
/// Flag bit for write permission within `Header::flags`.
pub const FLAG_WRITE: u32 = 1 << 1;
/// `LIST`-only flag: list registered usernames instead of files (spec
/// §4.2 "list users; list files" are two operations sharing one opcode).
/// Reuses the header's reserved bit 2.
pub const FLAG_LIST_USERS: u32 = 1 << 2;
