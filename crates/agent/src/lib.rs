//! # itg-remote agent
//!
//! The controlled side of the channel. An [`Agent`] owns a [`Host`], one
//! [`Session`] and the channel pair of a transport. Each tick it drains the
//! transport, answers every complete command packet, emits due beacons and
//! flushes what it produced.
//!
//! ## Example
//!
//! ```no_run
//! use itg_remote_agent::{Agent, AgentConfig, SimHost};
//! use itg_remote_agent::transport::websocket::WebSocketClient;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AgentConfig::default();
//!     let transport = WebSocketClient::new(config.controller_url.clone())
//!         .with_reconnect_delay(config.reconnect_delay);
//!
//!     let agent = Agent::spawn(SimHost::ready(), config, transport);
//!     agent.run().await.ok();
//! }
//! ```

pub mod beacon;
pub mod config;
pub mod dispatch;
pub mod host;
pub mod pause;
pub mod session;
pub mod sim;
pub mod transport;

use std::time::Duration;

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio::time::Instant;

use itg_remote_protocol::{Frame, Transport, TransportEvent};

pub use beacon::BeaconSchedule;
pub use config::AgentConfig;
pub use dispatch::dispatch;
pub use host::{Host, HostError, PlayerSlot, PlayerStats, SongInfo};
pub use pause::{PauseProbe, PauseSurfaces};
pub use session::Session;
pub use sim::SimHost;

/// Agent event loop
pub struct Agent<H: Host> {
    host: H,
    session: Session,
    beacon: BeaconSchedule,
    tick_interval: Duration,
    started_at: Instant,

    /// Events from the transport layer
    events_rx: mpsc::Receiver<TransportEvent>,

    /// Frames to the transport layer
    outgoing_tx: mpsc::Sender<Frame>,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Command packets answered
    pub handled: usize,

    /// Frames still waiting for channel capacity
    pub pending: usize,
}

impl<H: Host> Agent<H> {
    /// Creates an agent on an existing channel pair
    pub fn new(
        host: H,
        config: &AgentConfig,
        events_rx: mpsc::Receiver<TransportEvent>,
        outgoing_tx: mpsc::Sender<Frame>,
    ) -> Self {
        Self {
            host,
            session: Session::new(),
            beacon: BeaconSchedule::new(config.heartbeat_interval),
            tick_interval: config.tick_interval,
            started_at: Instant::now(),
            events_rx,
            outgoing_tx,
        }
    }

    /// Creates an agent and runs `transport` on a background task
    pub fn spawn<T: Transport>(host: H, config: AgentConfig, transport: T) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(config.channel_capacity);

        tokio::spawn(async move {
            if let Err(e) = transport.run(events_tx, outgoing_rx).await {
                tracing::error!(error = %e, "Agent transport stopped");
            }
        });

        Self::new(host, &config, events_rx, outgoing_tx)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs one non-blocking pass of the loop
    ///
    /// Returns [`AgentError::TransportClosed`] once the transport has gone
    /// away for good.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, AgentError> {
        let mut report = TickReport::default();

        loop {
            match self.events_rx.try_recv() {
                Ok(event) => report.handled += self.handle_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.session.disconnect();
                    return Err(AgentError::TransportClosed);
                }
            }
        }

        if self.session.is_connected() {
            let screen = self.host.top_screen().unwrap_or_default();
            let uptime = now.duration_since(self.started_at);
            for beacon in self.beacon.poll(&mut self.session, &screen, uptime, now) {
                tracing::trace!(line = %beacon, "Beacon");
                self.session.enqueue(Frame::Text(beacon.to_line()));
            }
        }

        report.pending = self.flush()?;
        Ok(report)
    }

    /// Ticks until the transport closes, sleeping between passes
    pub async fn run(mut self) -> Result<(), AgentError> {
        loop {
            match self.tick(Instant::now()) {
                Ok(_) => {}
                Err(AgentError::TransportClosed) => {
                    tracing::info!("Agent shutting down: transport closed");
                    return Ok(());
                }
            }
            tokio::time::sleep(self.tick_interval).await;
        }
    }

    fn handle_event(&mut self, event: TransportEvent) -> usize {
        match event {
            TransportEvent::Connected => {
                self.session.connect();
                0
            }
            TransportEvent::Disconnected => {
                self.session.disconnect();
                0
            }
            TransportEvent::Frame(Frame::Binary(bytes)) => {
                let packets = self.session.receive(&bytes);
                for packet in &packets {
                    let response = dispatch(&mut self.session, &mut self.host, packet);
                    tracing::debug!(
                        command = packet.command(),
                        response_id = response.command(),
                        len = response.payload().len(),
                        "Responding"
                    );
                    self.session.enqueue(Frame::Binary(response.encode()));
                }
                packets.len()
            }
            TransportEvent::Frame(Frame::Text(line)) => {
                tracing::debug!(line = %line, "Ignoring text frame");
                0
            }
        }
    }

    /// Hands queued frames to the transport without waiting
    fn flush(&mut self) -> Result<usize, AgentError> {
        let outbox = self.session.outbox_mut();
        while let Some(frame) = outbox.pop_front() {
            match self.outgoing_tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(frame)) => {
                    outbox.push_front(frame);
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    outbox.clear();
                    return Err(AgentError::TransportClosed);
                }
            }
        }
        Ok(outbox.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Transport channel closed")]
    TransportClosed,
}
