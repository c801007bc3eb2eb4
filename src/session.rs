//! Join/ready handshake and reconnect pacing.
//!
//! The transport itself lives outside the core.  It reports open/close and
//! hands over server acks; [`Session`] decides what to send back and when
//! snapshots may be trusted.

use crate::orchestrator::CommandSink;
use crate::protocol::ClientMessage;
use log::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Transport open, `join` sent, waiting for the first ack.
    Joining,
    /// Join accepted, `ready` sent, waiting for the second ack.
    Joined,
    /// Handshake complete; snapshots are accepted.
    Ready,
}

/// What an ack did to the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Joined,
    Ready,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Session {
    player_id: i32,
    player_name: String,
    state: ConnectionState,
}

impl Session {
    pub fn new(player_id: i32, player_name: impl Into<String>) -> Self {
        Self {
            player_id,
            player_name: player_name.into(),
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.state, ConnectionState::Joined | ConnectionState::Ready)
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Transport opened: introduce ourselves.
    pub fn on_open(&mut self, sink: &mut dyn CommandSink) {
        info!(
            "Connected; joining as player {} ({})",
            self.player_id, self.player_name
        );
        self.state = ConnectionState::Joining;
        sink.send(ClientMessage::Join {
            player_id: self.player_id,
            name: self.player_name.clone(),
        });
    }

    /// First ok ack completes the join and sends `ready`; the second one
    /// completes the handshake.  A rejected ack changes nothing.
    pub fn on_ack(&mut self, ok: bool, sink: &mut dyn CommandSink) -> AckOutcome {
        if !ok {
            warn!("Server rejected handshake step in state {:?}", self.state);
            return AckOutcome::Ignored;
        }
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Joining => {
                info!("Join accepted");
                self.state = ConnectionState::Joined;
                sink.send(ClientMessage::Ready { ready: true });
                AckOutcome::Joined
            }
            ConnectionState::Joined => {
                info!("Ready to play");
                self.state = ConnectionState::Ready;
                AckOutcome::Ready
            }
            ConnectionState::Ready => AckOutcome::Ignored,
        }
    }

    pub fn on_close(&mut self) {
        debug!("Session closed in state {:?}", self.state);
        self.state = ConnectionState::Disconnected;
    }
}

// ---------------------------------------------------------------------------
// Reconnect pacing
// ---------------------------------------------------------------------------

/// Counts disconnects and says when the transport should try again.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    delay: f32,
    attempts: u32,
    elapsed: f32,
    waiting: bool,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, delay: f32) -> Self {
        Self {
            max_attempts,
            delay: delay.max(0.0),
            attempts: 0,
            elapsed: 0.0,
            waiting: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn on_disconnect(&mut self) {
        self.attempts += 1;
        self.elapsed = 0.0;
        self.waiting = true;
        if self.exhausted() {
            warn!(
                "Disconnected; giving up after {} attempts",
                self.attempts
            );
        } else {
            warn!(
                "Disconnected; reconnecting ({}/{})",
                self.attempts, self.max_attempts
            );
        }
    }

    /// Advance the retry timer.  True exactly once per disconnect, when the
    /// delay has passed and attempts remain.
    pub fn poll(&mut self, dt: f32) -> bool {
        if !self.waiting || self.exhausted() {
            return false;
        }
        self.elapsed += dt.max(0.0);
        if self.elapsed >= self.delay {
            self.elapsed = 0.0;
            self.waiting = false;
            return true;
        }
        false
    }

    /// Handshake completed; start counting from zero again.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.elapsed = 0.0;
        self.waiting = false;
    }
}
