//! Liveness tracking for an established conversation.

use std::time::Duration;

use tokio::time::Instant;

/// Idle time after which the listener probes the connection with a `PING`.
pub const PING_IDLE: Duration = Duration::from_secs(10);
/// Idle time after which the connection is considered lost.
pub const PING_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    Nothing,
    SendPing,
    TimedOut,
}

#[derive(Debug)]
pub struct Keepalive {
    last_received_at: Instant,
    ping_outstanding: bool,
    /// Only the listener ever starts a ping; the dialer just answers.
    initiates_pings: bool,
}

impl Keepalive {
    pub fn new(now: Instant, initiates_pings: bool) -> Keepalive {
        Keepalive {
            last_received_at: now,
            ping_outstanding: false,
            initiates_pings,
        }
    }

    /// Advance the monitor to `now`. A returned `SendPing` is already counted as outstanding.
    pub fn poll(&mut self, now: Instant) -> KeepaliveAction {
        let elapsed = now.saturating_duration_since(self.last_received_at);
        if elapsed > PING_TIMEOUT {
            return KeepaliveAction::TimedOut;
        }
        if self.initiates_pings && elapsed > PING_IDLE && !self.ping_outstanding {
            self.ping_outstanding = true;
            return KeepaliveAction::SendPing;
        }
        KeepaliveAction::Nothing
    }

    /// Any frame from the peer counts as a sign of life.
    pub fn record_received(&mut self, now: Instant) {
        self.last_received_at = now;
    }

    pub fn record_pong(&mut self) {
        self.ping_outstanding = false;
    }

    pub fn ping_outstanding(&self) -> bool {
        self.ping_outstanding
    }
}
