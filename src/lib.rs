//! # A tiny two-party instant messenger.
//!
//! One side listens for a connection, the other dials out. After a nickname handshake the two
//! sides exchange chat messages over a single TCP connection until either of them quits. In the
//! terminal a user can:
//!
//! 1. Accept or decline an incoming conversation (unless `--assume-yes`),
//! 2. Type and send chat messages,
//! 3. End the conversation with Ctrl+C or Ctrl+D.
//!
//! Every chat message is acknowledged by the receiver. Messages still unacknowledged when the
//! program exits are counted and reported. While the connection is idle the listener pings the
//! dialer, and a connection that stays silent for a minute is considered lost.
//!
//! Architecture:
//!
//! ```text
//!  config::resolve
//!        v
//! +--------------+              +-----------+              +-----------------------+
//! | peer::listen |--> accept -->|           |              | Session               |
//! +--------------+              | handshake |-Connection-->|  Keepalive  Ledger    |
//! | peer::dial   |------------->|           |              |  select! on input,    |
//! +--------------+              +-----------+              |  frames, accept, tick |
//!                                                          +-----------------------+
//!                                                              ^              v
//!                                                          InputEvent      Frontend
//!                                                              |              |
//!                                                          +---------------------+
//!                                                          |      Terminal       |
//!                                                          +---------------------+
//!                                                              ^              v
//!                                                            stdin          stdout
//! ```

pub mod config;
pub mod error;
pub mod handshake;
pub mod keepalive;
pub mod ledger;
pub mod message;
pub mod peer;
pub mod session;
pub mod terminal;

pub use error::{Error, ProtocolError, Result};

/// Prefix of every notice and diagnostic printed to the user.
pub const PROGRAM: &str = env!("CARGO_PKG_NAME");
