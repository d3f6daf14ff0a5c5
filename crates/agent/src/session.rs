//! Per-connection agent state
//!
//! Exactly one [`Session`] exists per agent. It is reset whenever the
//! transport reports a new connection and cleared when it is lost, so no
//! state survives from one controller connection to the next.

use std::collections::VecDeque;

use itg_remote_protocol::{Frame, Packet, Reassembler};
use tokio::time::Instant;
use uuid::Uuid;

use crate::pause::PauseProbe;

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    connected: bool,
    reassembler: Reassembler,

    pub(crate) last_heartbeat: Option<Instant>,
    pub(crate) last_screen: Option<String>,
    pub(crate) pause_probe: Option<PauseProbe>,

    outbox: VecDeque<Frame>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            connected: false,
            reassembler: Reassembler::new(),
            last_heartbeat: None,
            last_screen: None,
            pause_probe: None,
            outbox: VecDeque::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Pause probe that last succeeded on this connection
    pub fn pause_probe(&self) -> Option<PauseProbe> {
        self.pause_probe
    }

    /// Screen named by the last screen beacon
    pub fn last_screen(&self) -> Option<&str> {
        self.last_screen.as_deref()
    }

    /// Starts a fresh session for a new connection
    pub fn connect(&mut self) {
        self.reset();
        self.id = Uuid::new_v4();
        self.connected = true;
        tracing::info!(session = %self.id, "Session started");
    }

    /// Drops all per-connection state
    pub fn disconnect(&mut self) {
        if self.connected {
            tracing::info!(session = %self.id, "Session ended");
        }
        self.reset();
        self.connected = false;
    }

    fn reset(&mut self) {
        self.reassembler.clear();
        self.last_heartbeat = None;
        self.last_screen = None;
        self.pause_probe = None;
        self.outbox.clear();
    }

    /// Feeds received bytes and returns the packets they complete
    pub fn receive(&mut self, chunk: &[u8]) -> Vec<Packet> {
        self.reassembler.push(chunk)
    }

    /// Bytes held back waiting for the rest of a packet
    pub fn buffered_len(&self) -> usize {
        self.reassembler.buffered_len()
    }

    pub fn enqueue(&mut self, frame: Frame) {
        self.outbox.push_back(frame);
    }

    pub(crate) fn outbox_mut(&mut self) -> &mut VecDeque<Frame> {
        &mut self.outbox
    }

    pub fn pending_frames(&self) -> usize {
        self.outbox.len()
    }
}
