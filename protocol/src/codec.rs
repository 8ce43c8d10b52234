//! Async framing on top of [`Header`]: read/write exactly one message at a
//! time from any `tokio` socket. Used identically by client→NM, client→SS,
//! and NM→SS connections.

use crate::error::ProtocolError;
use crate::header::{Header, HEADER_LEN};
use crate::limits::MAX_PAYLOAD;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One wire message: a header plus however many `data_length` bytes of
/// payload it advertises.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(header: Header, payload: Vec<u8>) -> Self {
        Self { header, payload }
    }

    pub fn without_payload(header: Header) -> Self {
        Self {
            header,
            payload: Vec::new(),
        }
    }

    /// Interprets the payload as UTF-8 text, the case for every opcode this
    /// protocol defines (spec §1 non-goal: text only, not arbitrary blobs).
    pub fn payload_str(&self) -> Result<&str, ProtocolError> {
        std::str::from_utf8(&self.payload).map_err(|_| ProtocolError::InvalidUtf8 {
            field: "payload",
        })
    }
}

/// Reads one message off `reader`. Rejects (without allocating the buffer)
/// any `data_length` that exceeds `MAX_PAYLOAD`, per spec §5's back-pressure
/// requirement.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Message, ProtocolError> {
    let mut header_buf = vec![0u8; HEADER_LEN];
    reader
        .read_exact(&mut header_buf)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ProtocolError::ConnectionClosed,
            _ => ProtocolError::Io(e),
        })?;
    let header = Header::decode(&header_buf)?;

    if header.data_length > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            got: header.data_length,
            max: MAX_PAYLOAD,
        });
    }

    let mut payload = vec![0u8; header.data_length as usize];
    if !payload.is_empty() {
        reader.read_exact(&mut payload).await?;
    }

    Ok(Message { header, payload })
}

/// Writes one message to `writer` in a single buffered call so a concurrent
/// reader never observes a half-written header.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg: &Message,
) -> Result<(), ProtocolError> {
    let mut header = msg.header.clone();
    header.data_length = msg.payload.len() as u32;
    let mut buf = header.encode()?;
    buf.extend_from_slice(&msg.payload);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Encodes a word-write payload's content, turning literal newlines into the
/// `<NL>` token the header can't carry (spec §4.1).
pub fn encode_word_payload(content: &str) -> Vec<u8> {
    content.replace('\n', "<NL>").into_bytes()
}

/// Reverses [`encode_word_payload`].
pub fn decode_word_payload(payload: &[u8]) -> Result<String, ProtocolError> {
    let s = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8 {
        field: "payload",
    })?;
    Ok(s.replace("<NL>", "\n"))
}

/// Formats an SS locator as `"<ip>:<port>"` (spec §4.1).
pub fn encode_locator(addr: std::net::SocketAddr) -> Vec<u8> {
    addr.to_string().into_bytes()
}
