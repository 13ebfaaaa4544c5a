//! Nickname exchange that opens every conversation.
//!
//! The dialer introduces itself first. The listener reads that introduction, optionally asks the
//! local user whether to talk, and answers with its own `NICK` or with `BUSY`.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use crate::config::SessionConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::message::Message;
use crate::peer::{receive, send, send_best_effort, Connection, Role};

/// How the peer is named before it has told us its nickname.
pub const UNKNOWN_PEER: &str = "Your peer";

/// Asks the local user a yes/no question.
pub trait Prompt {
    /// `None` when the user can no longer answer (end of input).
    fn confirm(&mut self, question: &str) -> io::Result<Option<bool>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// Both sides know each other's nickname; the conversation can start.
    Talking { peer_nick: String },
    /// The local user turned the peer down and `BUSY` was sent.
    Declined,
    /// Input ended before the local user answered.
    Abandoned,
}

/// Run the role-specific exchange on a freshly established connection.
pub async fn handshake<T, P>(
    conn: &mut Connection<T>,
    config: &SessionConfig,
    peer_addr: SocketAddr,
    prompt: &mut P,
) -> Result<HandshakeOutcome>
where
    T: AsyncRead + AsyncWrite + Unpin,
    P: Prompt + ?Sized,
{
    match config.role {
        Role::Listener => answer(conn, config, peer_addr, prompt).await,
        Role::Dialer => introduce(conn, config).await,
    }
}

async fn answer<T, P>(
    conn: &mut Connection<T>,
    config: &SessionConfig,
    peer_addr: SocketAddr,
    prompt: &mut P,
) -> Result<HandshakeOutcome>
where
    T: AsyncRead + AsyncWrite + Unpin,
    P: Prompt + ?Sized,
{
    let peer_nick = match receive(conn, UNKNOWN_PEER).await? {
        Message::Nick(name) => name,
        other => return Err(ProtocolError::UnexpectedMessage(other.kind()).into()),
    };
    info!(peer = %peer_nick, %peer_addr, "peer introduced itself");

    if !config.assume_yes {
        let question = format!("Talk to \"{peer_nick}\" from {}? [y/N]: ", peer_addr.ip());
        match prompt
            .confirm(&question)
            .map_err(|err| Error::io("read stdin", err))?
        {
            Some(true) => {}
            Some(false) => {
                send_best_effort(conn, Message::Busy).await;
                return Ok(HandshakeOutcome::Declined);
            }
            None => return Ok(HandshakeOutcome::Abandoned),
        }
    }

    send(conn, Message::Nick(config.nick.clone())).await?;
    Ok(HandshakeOutcome::Talking { peer_nick })
}

async fn introduce<T>(conn: &mut Connection<T>, config: &SessionConfig) -> Result<HandshakeOutcome>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    send(conn, Message::Nick(config.nick.clone())).await?;
    match receive(conn, UNKNOWN_PEER).await? {
        Message::Nick(peer_nick) => {
            info!(peer = %peer_nick, "peer accepted the conversation");
            Ok(HandshakeOutcome::Talking { peer_nick })
        }
        Message::Busy => Err(Error::PeerBusy),
        other => Err(ProtocolError::UnexpectedMessage(other.kind()).into()),
    }
}
