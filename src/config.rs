//! Command-line configuration and address resolution.

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use tokio::net::lookup_host;

use crate::error::{Error, Result};
use crate::message::{valid_nick, MAX_NICK_LEN};
use crate::peer::Role;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7171;
pub const MAX_ADDR_LEN: usize = 400;

/// Tiny instant messenger: talk to one peer over TCP.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "tim",
    version,
    about,
    after_help = "Examples:\n    tim -l\n    tim -c localhost -n ferris\n    tim -l [::1]:8000 -y\n    tim -c [::1]:8000 -n ferris"
)]
pub struct Cli {
    /// Listen for a connection, on any IPv4 address unless ADDR is given.
    #[arg(short, long, value_name = "ADDR", num_args = 0..=1, default_missing_value = DEFAULT_HOST, conflicts_with = "connect")]
    pub listen: Option<String>,

    /// Open a connection to ADDR.
    #[arg(short, long, value_name = "ADDR")]
    pub connect: Option<String>,

    /// Nickname to introduce yourself with. Defaults to your user name.
    #[arg(short, long)]
    pub nick: Option<String>,

    /// Accept incoming conversations without asking.
    #[arg(short = 'y', long)]
    pub assume_yes: bool,

    /// Where to send BUSY when a second peer tries to connect while listening.
    #[arg(long, value_enum, default_value_t = BusyReply::Established)]
    pub busy_reply: BusyReply,
}

/// Socket that receives the `BUSY` reply when a second connection attempt is turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BusyReply {
    /// The conversation already in progress (the historical behavior; the current peer treats it
    /// as an unexpected message).
    #[default]
    Established,
    /// The connection that was just accepted and is about to be closed.
    Newcomer,
}

/// Settings threaded through the handshake and the event loop.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub nick: String,
    pub role: Role,
    pub assume_yes: bool,
    pub busy_reply: BusyReply,
}

impl Cli {
    /// `None` when neither `--listen` nor `--connect` was given.
    pub fn role(&self) -> Option<(Role, Option<&str>)> {
        match (&self.listen, &self.connect) {
            (Some(addr), _) => Some((Role::Listener, Some(addr.as_str()))),
            (None, Some(addr)) => Some((Role::Dialer, Some(addr.as_str()))),
            (None, None) => None,
        }
    }

    pub fn session_config(&self, role: Role) -> Result<SessionConfig> {
        let nick = match &self.nick {
            Some(nick) => nick.clone(),
            None => whoami::fallible::username()
                .map_err(|err| Error::Config(format!("Could not determine your user name: {err}")))?,
        };
        if nick.len() > MAX_NICK_LEN {
            return Err(Error::Config(format!(
                "Your nickname must be at most {MAX_NICK_LEN} characters long"
            )));
        }
        if !valid_nick(&nick) {
            return Err(Error::Config(
                "Your nickname must not be empty or contain whitespace".to_string(),
            ));
        }
        Ok(SessionConfig {
            nick,
            role,
            assume_yes: self.assume_yes,
            busy_reply: self.busy_reply,
        })
    }
}

/// Split `host:port`, `[v6]:port`, `host` or `:port` into its optional parts.
pub fn split_addr(addr: &str) -> (Option<&str>, Option<&str>) {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, after) = match rest.find(']') {
            Some(end) => (&rest[..end], &rest[end + 1..]),
            None => (rest, ""),
        };
        return (Some(host), after.strip_prefix(':'));
    }
    match addr.split_once(':') {
        Some((host, port)) => ((!host.is_empty()).then_some(host), Some(port)),
        None => ((!addr.is_empty()).then_some(addr), None),
    }
}

/// Resolve an address argument into the candidates to listen on or dial, in lookup order.
pub async fn resolve(addr: Option<&str>) -> Result<Vec<SocketAddr>> {
    let (host, port) = match addr {
        Some(addr) if addr.len() > MAX_ADDR_LEN => {
            return Err(Error::Config(format!(
                "Address must be less than {MAX_ADDR_LEN} characters long"
            )));
        }
        Some(addr) => split_addr(addr),
        None => (None, None),
    };
    let host = host.unwrap_or(DEFAULT_HOST);
    let port = match port {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| Error::Config(format!("Invalid port \"{port}\"")))?,
        None => DEFAULT_PORT,
    };

    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| Error::Resolution {
            host: host.to_string(),
            source,
        })?
        .collect();
    if candidates.is_empty() {
        return Err(Error::Resolution {
            host: host.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"),
        });
    }
    Ok(candidates)
}
