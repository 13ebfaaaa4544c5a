//! Wire format shared by both peers.
//!
//! Every frame is exactly [`FRAME_LEN`] bytes of ASCII: a verb, its arguments, then zero padding
//! up to the frame size.
//!
//! ```text
//! NICK <name>
//! BUSY
//! MSG <id> <body>
//! ACK <id>
//! PING
//! PONG
//! QUIT
//! ```
//!
//! Names are at most [`MAX_NICK_LEN`] bytes without whitespace, bodies at most [`MAX_BODY_LEN`]
//! bytes without a newline. Oversized fields are rejected on both sides rather than truncated.

use std::fmt;
use std::io;
use std::str;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

pub const FRAME_LEN: usize = 1024;
pub const MAX_NICK_LEN: usize = 18;
pub const MAX_BODY_LEN: usize = 800;

/// Identifier of a locally originated chat message, echoed back in its `ACK`.
pub type MessageId = u32;

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Introduce ourselves and request (dialer) or accept (listener) a conversation.
    Nick(String),
    /// Decline a conversation.
    Busy,
    ChatMsg { id: MessageId, body: String },
    /// Acknowledge the chat message with this id.
    Ack(MessageId),
    /// Probe an idle connection.
    Ping,
    Pong,
    Quit,
}

/// Message tag without its payload, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Nick,
    Busy,
    ChatMsg,
    Ack,
    Ping,
    Pong,
    Quit,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Nick(_) => MessageKind::Nick,
            Message::Busy => MessageKind::Busy,
            Message::ChatMsg { .. } => MessageKind::ChatMsg,
            Message::Ack(_) => MessageKind::Ack,
            Message::Ping => MessageKind::Ping,
            Message::Pong => MessageKind::Pong,
            Message::Quit => MessageKind::Quit,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let verb = match self {
            MessageKind::Nick => "NICK",
            MessageKind::Busy => "BUSY",
            MessageKind::ChatMsg => "MSG",
            MessageKind::Ack => "ACK",
            MessageKind::Ping => "PING",
            MessageKind::Pong => "PONG",
            MessageKind::Quit => "QUIT",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid message")]
    InvalidMessage,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A nickname must survive the trip through the single-token `NICK` argument.
pub fn valid_nick(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NICK_LEN
        && !name.bytes().any(|b| b.is_ascii_whitespace() || b == 0)
}

pub fn valid_body(body: &str) -> bool {
    !body.is_empty() && body.len() <= MAX_BODY_LEN && !body.bytes().any(|b| b == b'\n' || b == 0)
}

/// Append one zero-padded frame for `msg` to `dst`.
pub fn encode(msg: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
    let text = match msg {
        Message::Nick(name) if valid_nick(name) => format!("NICK {name}"),
        Message::ChatMsg { id, body } if valid_body(body) => format!("MSG {id} {body}"),
        Message::Nick(_) | Message::ChatMsg { .. } => return Err(CodecError::InvalidMessage),
        Message::Busy => "BUSY".to_string(),
        Message::Ack(id) => format!("ACK {id}"),
        Message::Ping => "PING".to_string(),
        Message::Pong => "PONG".to_string(),
        Message::Quit => "QUIT".to_string(),
    };
    dst.reserve(FRAME_LEN);
    dst.put_slice(text.as_bytes());
    dst.put_bytes(0, FRAME_LEN - text.len());
    Ok(())
}

/// Parse one frame. Text after the first NUL byte is padding and ignored.
///
/// Verbs are tried in a fixed order with `BUSY` first, so an exact `BUSY` never falls through to
/// one of the argument-carrying shapes.
pub fn decode(frame: &[u8]) -> Result<Message, CodecError> {
    let end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
    let text = str::from_utf8(&frame[..end]).map_err(|_| CodecError::InvalidMessage)?;

    if text == "BUSY" {
        return Ok(Message::Busy);
    }
    if let Some(name) = text.strip_prefix("NICK ") {
        if valid_nick(name) {
            return Ok(Message::Nick(name.to_string()));
        }
    }
    if let Some((id, body)) = text.strip_prefix("MSG ").and_then(|rest| rest.split_once(' ')) {
        if let Some(id) = parse_id(id) {
            if valid_body(body) {
                return Ok(Message::ChatMsg {
                    id,
                    body: body.to_string(),
                });
            }
        }
    }
    if let Some(id) = text.strip_prefix("ACK ").and_then(parse_id) {
        return Ok(Message::Ack(id));
    }
    match text {
        "PING" => Ok(Message::Ping),
        "PONG" => Ok(Message::Pong),
        "QUIT" => Ok(Message::Quit),
        _ => Err(CodecError::InvalidMessage),
    }
}

fn parse_id(digits: &str) -> Option<MessageId> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Frames a byte stream into [`Message`]s.
///
/// Reads that deliver less than a whole frame stay buffered until the rest arrives.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        if src.len() < FRAME_LEN {
            src.reserve(FRAME_LEN - src.len());
            return Ok(None);
        }
        let frame = src.split_to(FRAME_LEN);
        decode(&frame).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        match self.decode(src)? {
            Some(msg) => Ok(Some(msg)),
            None => {
                if !src.is_empty() {
                    debug!(bytes = src.len(), "discarding partial frame at end of stream");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Message> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode(&item, dst)
    }
}
