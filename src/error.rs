//! Error taxonomy shared by the establisher, the handshake and the event loop.
//!
//! Every variant is fatal. The binary prints the `Display` form behind the program name and exits
//! with status 1; clean terminations are reported through [`crate::session::Outcome`] and
//! [`crate::handshake::HandshakeOutcome`] instead.

use std::io;

use crate::message::MessageKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid arguments, before any networking happens.
    #[error("{0}")]
    Config(String),

    #[error("getaddrinfo: {host}: {source}")]
    Resolution { host: String, source: io::Error },

    /// Bind, listen, accept or connect failed; `op` names the last step that failed.
    #[error("{op}: {source}")]
    Connection {
        op: &'static str,
        source: io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Your peer is busy")]
    PeerBusy,

    #[error("Lost connection to {peer}")]
    Timeout { peer: String },

    #[error("{peer} has disconnected unexpectedly")]
    PeerDisconnect { peer: String },

    /// Socket or terminal I/O failure outside of connection setup.
    #[error("{op}: {source}")]
    Io {
        op: &'static str,
        source: io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Read an invalid message")]
    InvalidMessage,

    #[error("Read an unexpected message ({0})")]
    UnexpectedMessage(MessageKind),
}

impl Error {
    pub fn io(op: &'static str, source: io::Error) -> Error {
        Error::Io { op, source }
    }

    pub(crate) fn connection(op: &'static str, source: io::Error) -> Error {
        Error::Connection { op, source }
    }
}
