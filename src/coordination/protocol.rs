//! Process-group wire protocol
//!
//! Messages exchanged between the leader (rank 0) and every other rank. The
//! protocol uses MessagePack (rmp-serde) with a 4-byte little-endian length
//! prefix per frame.
//!
//! # Message Flow
//!
//! ```text
//! Member (rank r)                 Leader (rank 0)
//!     |                              |
//!     |-------- HELLO(r) ----------->|
//!     |                              |   (waits for all ranks)
//!     |<------- WELCOME -------------|
//!     |                              |
//!     |-------- ARRIVE(b) ---------->|
//!     |                              |   (waits for all ranks)
//!     |<------- RELEASE(b) ----------|
//!     |                              |
//!     |<------- ABORT --------------->|   (either direction, on failure)
//! ```
//!
//! # Message Framing
//!
//! ```text
//! [4 bytes: message length][N bytes: MessagePack-serialized message]
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version
///
/// Leader and members must agree; a mismatch fails the rendezvous.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Member announces itself (Member → Leader)
    Hello(HelloMessage),

    /// Group is complete (Leader → Member)
    Welcome(WelcomeMessage),

    /// Member reached barrier `barrier` (Member → Leader)
    Arrive { barrier: u64 },

    /// Every rank reached barrier `barrier` (Leader → Member)
    Release { barrier: u64 },

    /// A rank gave up; the run cannot complete (either direction)
    Abort(AbortMessage),
}

/// Hello message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloMessage {
    pub protocol_version: u32,
    pub rank: usize,
    pub world_size: usize,
    /// Host name of the member, for diagnostics
    pub host: String,
}

/// Welcome message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    pub protocol_version: u32,
    pub world_size: usize,
}

/// Abort message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortMessage {
    /// Rank that failed
    pub rank: usize,
    pub reason: String,
}

/// Serialize a message with its length prefix
pub fn serialize_message(msg: &Message) -> io::Result<Vec<u8>> {
    let body = rmp_serde::to_vec(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mut framed = Vec::with_capacity(4 + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_le_bytes());
    framed.extend_from_slice(&body);
    Ok(framed)
}

/// Deserialize one framed message from `buf`
///
/// Returns the message and the number of bytes consumed, length prefix
/// included.
pub fn deserialize_message(buf: &[u8]) -> io::Result<(Message, usize)> {
    if buf.len() < 4 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("buffer too small for message length (need 4 bytes, got {})", buf.len()),
        ));
    }

    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    if buf.len() < 4 + len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("incomplete message (need {} bytes, got {})", 4 + len, buf.len()),
        ));
    }

    let msg = decode_body(&buf[4..4 + len])?;
    Ok((msg, 4 + len))
}

/// Read one complete message
pub async fn read_message<R>(reader: &mut R) -> io::Result<Message>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message too large: {} bytes (max {})", len, MAX_FRAME_LEN),
        ));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    decode_body(&body)
}

/// Write one message and flush
pub async fn write_message<W>(writer: &mut W, msg: &Message) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let framed = serialize_message(msg)?;
    writer.write_all(&framed).await?;
    writer.flush().await
}

fn decode_body(body: &[u8]) -> io::Result<Message> {
    rmp_serde::from_slice(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize_hello() {
        let msg = Message::Hello(HelloMessage {
            protocol_version: PROTOCOL_VERSION,
            rank: 3,
            world_size: 4,
            host: "node-a".to_string(),
        });

        let bytes = serialize_message(&msg).unwrap();
        let (decoded, consumed) = deserialize_message(&bytes).unwrap();

        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_message_framing() {
        let bytes = serialize_message(&Message::Release { barrier: 7 }).unwrap();
        let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        assert_eq!(bytes.len(), 4 + len);
    }

    #[test]
    fn test_deserialize_incomplete() {
        let bytes = serialize_message(&Message::Arrive { barrier: 1 }).unwrap();
        let err = deserialize_message(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(deserialize_message(&bytes[..2]).is_err());
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(1024);

        let abort = Message::Abort(AbortMessage {
            rank: 2,
            reason: "unit failed".to_string(),
        });
        write_message(&mut a, &Message::Arrive { barrier: 0 }).await.unwrap();
        write_message(&mut a, &abort).await.unwrap();

        assert_eq!(read_message(&mut b).await.unwrap(), Message::Arrive { barrier: 0 });
        assert_eq!(read_message(&mut b).await.unwrap(), abort);
    }

    #[tokio::test]
    async fn test_read_eof() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        let err = read_message(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_rejects_oversized_frame() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&(MAX_FRAME_LEN as u32 + 1).to_le_bytes()).await.unwrap();
        let err = read_message(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
