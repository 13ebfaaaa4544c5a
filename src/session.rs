//! The conversation itself: one task multiplexing terminal input, the peer connection, the
//! listening socket and a one second tick.
//!
//! Nothing here runs in parallel. Every wake-up is handled to completion, replies included,
//! before the loop waits again.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::{BusyReply, SessionConfig};
use crate::error::{Error, ProtocolError, Result};
use crate::keepalive::{Keepalive, KeepaliveAction};
use crate::ledger::Ledger;
use crate::message::{CodecError, Message};
use crate::peer::{framed, into_message, send, send_best_effort, Connection, Role};
use crate::terminal::{Frontend, InputEvent};

/// Longest wait between two passes of the loop.
pub const TICK: Duration = Duration::from_secs(1);

/// How a conversation ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The local user quit.
    LocalQuit,
    /// The peer sent `QUIT`.
    PeerQuit,
}

enum Wake {
    Input(io::Result<InputEvent>),
    Frame(Option<Result<Message, CodecError>>),
    Intruder(io::Result<(TcpStream, SocketAddr)>),
    Tick,
}

pub struct Session<T, F> {
    config: SessionConfig,
    peer_nick: String,
    conn: Connection<T>,
    listener: Option<TcpListener>,
    frontend: F,
    ledger: Ledger,
    keepalive: Keepalive,
}

impl<T, F> Session<T, F>
where
    T: AsyncRead + AsyncWrite + Unpin,
    F: Frontend,
{
    /// Start a conversation on a connection that finished its handshake. The keepalive clock
    /// starts now.
    pub fn new(
        config: SessionConfig,
        peer_nick: String,
        conn: Connection<T>,
        listener: Option<TcpListener>,
        frontend: F,
    ) -> Session<T, F> {
        let keepalive = Keepalive::new(Instant::now(), config.role == Role::Listener);
        Session {
            config,
            peer_nick,
            conn,
            listener,
            frontend,
            ledger: Ledger::new(),
            keepalive,
        }
    }

    pub fn peer_nick(&self) -> &str {
        &self.peer_nick
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    /// Run until either side quits or something fatal happens.
    ///
    /// On error the input line is finalized first, so the caller can print its diagnostic on a
    /// clean line.
    pub async fn run(&mut self) -> Result<Outcome> {
        let result = self.event_loop().await;
        if result.is_err() {
            if let Err(err) = self.frontend.finalize_line() {
                debug!(error = %err, "could not finalize the input line");
            }
        }
        result
    }

    async fn event_loop(&mut self) -> Result<Outcome> {
        loop {
            let wake = tokio::select! {
                input = self.frontend.next_input() => Wake::Input(input),
                frame = self.conn.next() => Wake::Frame(frame),
                intruder = accept_intruder(self.listener.as_ref()) => Wake::Intruder(intruder),
                () = time::sleep(TICK) => Wake::Tick,
            };
            let now = Instant::now();

            match self.keepalive.poll(now) {
                KeepaliveAction::TimedOut => {
                    return Err(Error::Timeout {
                        peer: self.peer_nick.clone(),
                    });
                }
                KeepaliveAction::SendPing => {
                    debug!("connection idle, sending ping");
                    send(&mut self.conn, Message::Ping).await?;
                }
                KeepaliveAction::Nothing => {}
            }

            let outcome = match wake {
                Wake::Input(input) => {
                    let input = input.map_err(|err| Error::io("read stdin", err))?;
                    self.on_input(input).await?
                }
                Wake::Frame(frame) => {
                    let msg = into_message(frame, &self.peer_nick)?;
                    self.keepalive.record_received(now);
                    self.on_message(msg).await?
                }
                Wake::Intruder(intruder) => {
                    self.on_intruder(intruder).await;
                    None
                }
                Wake::Tick => None,
            };
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }
    }

    async fn on_input(&mut self, input: InputEvent) -> Result<Option<Outcome>> {
        match input {
            InputEvent::Quit => {
                self.frontend.finalize_line().map_err(stdout_err)?;
                self.frontend
                    .notice("You ended the conversation")
                    .map_err(stdout_err)?;
                send_best_effort(&mut self.conn, Message::Quit).await;
                Ok(Some(Outcome::LocalQuit))
            }
            InputEvent::Edit => {
                self.frontend.redraw().map_err(stdout_err)?;
                Ok(None)
            }
            InputEvent::Submit(line) if line.is_empty() => Ok(None),
            InputEvent::Submit(line) => {
                let id = self.ledger.submit(line.clone());
                send(
                    &mut self.conn,
                    Message::ChatMsg {
                        id,
                        body: line.clone(),
                    },
                )
                .await?;
                self.frontend.clear_line().map_err(stdout_err)?;
                self.frontend
                    .show_message(&self.config.nick, &line)
                    .map_err(stdout_err)?;
                Ok(None)
            }
        }
    }

    async fn on_message(&mut self, msg: Message) -> Result<Option<Outcome>> {
        match msg {
            Message::ChatMsg { id, body } => {
                self.frontend
                    .show_message(&self.peer_nick, &body)
                    .map_err(stdout_err)?;
                send(&mut self.conn, Message::Ack(id)).await?;
            }
            Message::Ack(id) => self.ledger.acknowledge(id),
            Message::Quit => {
                self.frontend.finalize_line().map_err(stdout_err)?;
                self.frontend
                    .notice(&format!("{} has ended the conversation", self.peer_nick))
                    .map_err(stdout_err)?;
                return Ok(Some(Outcome::PeerQuit));
            }
            Message::Ping => send(&mut self.conn, Message::Pong).await?,
            Message::Pong => self.keepalive.record_pong(),
            Message::Nick(_) | Message::Busy => {
                return Err(ProtocolError::UnexpectedMessage(msg.kind()).into());
            }
        }
        Ok(None)
    }

    /// Someone else tried to connect while we are talking. Turn them away with `BUSY`.
    async fn on_intruder(&mut self, intruder: io::Result<(TcpStream, SocketAddr)>) {
        let (stream, addr) = match intruder {
            Ok(accepted) => accepted,
            Err(err) => {
                debug!(error = %err, "failed to accept a second connection");
                return;
            }
        };
        warn!(%addr, reply_on = ?self.config.busy_reply, "turning away a second connection");
        match self.config.busy_reply {
            BusyReply::Established => send_best_effort(&mut self.conn, Message::Busy).await,
            BusyReply::Newcomer => send_best_effort(&mut framed(stream), Message::Busy).await,
        }
    }
}

async fn accept_intruder(listener: Option<&TcpListener>) -> io::Result<(TcpStream, SocketAddr)> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}

fn stdout_err(err: io::Error) -> Error {
    Error::io("write stdout", err)
}

impl<T, F> Drop for Session<T, F> {
    fn drop(&mut self) {
        info!(
            peer = %self.peer_nick,
            sent = self.ledger.len(),
            unacknowledged = self.ledger.unacknowledged_count(),
            "conversation closed"
        );
    }
}
