//! Opens the one TCP connection a conversation runs over.
//!
//! The listener binds the first candidate address that accepts it and then waits for exactly one
//! peer. The dialer tries candidates in order until a connect succeeds.
use std::io;
use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::error::{Error, ProtocolError, Result};
use crate::message::{CodecError, FrameCodec, Message};

/// Pending connections the kernel queues while we are busy talking.
const LISTEN_BACKLOG: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Listener,
    Dialer,
}

/// A live connection to the peer.
#[derive(Debug)]
pub struct Established {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    /// Still-open listening socket, kept so further attempts can be turned away.
    pub listener: Option<TcpListener>,
}

/// Bind and listen on the first candidate that allows it.
///
/// On failure the error reports the step (`socket`, `setsockopt`, `bind`, `listen`) that failed
/// for the last candidate tried.
pub fn listen(candidates: &[SocketAddr]) -> Result<TcpListener> {
    let mut last_err = no_candidates();
    for addr in candidates {
        match bind_one(*addr) {
            Ok(listener) => {
                info!(%addr, "listening for a peer");
                return Ok(listener);
            }
            Err(err) => {
                debug!(%addr, error = %err, "candidate address rejected");
                last_err = err;
            }
        }
    }
    Err(last_err)
}

fn bind_one(addr: SocketAddr) -> Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|err| Error::connection("socket", err))?;
    socket
        .set_reuseaddr(true)
        .map_err(|err| Error::connection("setsockopt", err))?;
    socket
        .bind(addr)
        .map_err(|err| Error::connection("bind", err))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|err| Error::connection("listen", err))
}

/// Wait for the single peer this listener serves. The listening socket stays open.
pub async fn accept(listener: TcpListener) -> Result<Established> {
    let (stream, peer_addr) = listener
        .accept()
        .await
        .map_err(|err| Error::connection("accept", err))?;
    info!(%peer_addr, "accepted connection");
    Ok(Established {
        stream,
        peer_addr,
        listener: Some(listener),
    })
}

/// Connect to the first reachable candidate.
pub async fn dial(candidates: &[SocketAddr]) -> Result<Established> {
    let mut last_err = no_candidates();
    for addr in candidates {
        match TcpStream::connect(*addr).await {
            Ok(stream) => {
                info!(%addr, "connected");
                return Ok(Established {
                    stream,
                    peer_addr: *addr,
                    listener: None,
                });
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect failed");
                last_err = Error::connection("connect", err);
            }
        }
    }
    Err(last_err)
}

/// A byte stream carrying whole frames in both directions.
pub type Connection<T = TcpStream> = Framed<T, FrameCodec>;

pub fn framed<T: AsyncRead + AsyncWrite>(stream: T) -> Connection<T> {
    Framed::new(stream, FrameCodec)
}

/// Send one frame and flush it. Failure is fatal to the conversation.
pub async fn send<T>(conn: &mut Connection<T>, msg: Message) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    debug!(kind = %msg.kind(), "sending");
    conn.send(msg).await.map_err(|err| match err {
        CodecError::InvalidMessage => ProtocolError::InvalidMessage.into(),
        CodecError::Io(err) => Error::io("write", err),
    })
}

/// Send a parting notice (`BUSY`, `QUIT`) on a connection that is ending anyway.
pub async fn send_best_effort<T>(conn: &mut Connection<T>, msg: Message)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(err) = send(conn, msg).await {
        debug!(error = %err, "ignoring failed send");
    }
}

/// Wait for the next frame from `peer`.
pub async fn receive<T>(conn: &mut Connection<T>, peer: &str) -> Result<Message>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    into_message(conn.next().await, peer)
}

/// Interpret one poll of the frame stream. The end of the stream means the peer went away.
pub fn into_message(frame: Option<Result<Message, CodecError>>, peer: &str) -> Result<Message> {
    match frame {
        Some(Ok(msg)) => {
            debug!(kind = %msg.kind(), "received");
            Ok(msg)
        }
        Some(Err(CodecError::InvalidMessage)) => Err(ProtocolError::InvalidMessage.into()),
        Some(Err(CodecError::Io(err))) => Err(Error::io("read", err)),
        None => Err(Error::PeerDisconnect {
            peer: peer.to_string(),
        }),
    }
}

fn no_candidates() -> Error {
    Error::connection(
        "connect",
        io::Error::new(io::ErrorKind::AddrNotAvailable, "no candidate addresses"),
    )
}
