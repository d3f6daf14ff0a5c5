//! # itg-remote controller
//!
//! The driving side of the channel. A [`Controller`] is a cheap, cloneable
//! handle: any number of tasks may send commands over the single agent
//! connection and each gets its own response back.
//!
//! ## Example
//!
//! ```no_run
//! use itg_remote_controller::{Controller, ControllerConfig};
//! use itg_remote_controller::transport::websocket::WebSocketServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ControllerConfig::default();
//!     let server = WebSocketServer::bind(config.bind_addr).await?;
//!     let controller = Controller::spawn(&config, server);
//!
//!     controller.wait_ready(config.ready_timeout).await?;
//!     let status = controller.status().await?;
//!     println!("agent is on {}", status.screen);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod correlator;
pub mod error;
pub mod harness;
pub mod link;
pub mod router;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot, watch};

use itg_remote_protocol::response::{GroupList, SongList, StatusResponse, StatusSnapshot};
use itg_remote_protocol::{
    expected_response_id, Frame, ListQuery, Packet, ProtocolError, Request, SetPaused, StartSong,
    Transport, TransportEvent,
};

pub use config::ControllerConfig;
pub use correlator::{Correlator, Delivery, Ticket};
pub use error::{ControllerError, Result};
pub use link::{LinkState, LinkStatus};
pub use router::ResponseRouter;

/// A decoded response
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Id the response arrived on
    pub response_id: u8,

    pub body: serde_json::Value,
}

impl Envelope {
    pub fn new(response_id: u8, body: serde_json::Value) -> Self {
        Self { response_id, body }
    }

    /// Value of the `ok` field; anything but `true` counts as failure
    pub fn is_ok(&self) -> bool {
        self.body.get("ok").and_then(serde_json::Value::as_bool) == Some(true)
    }

    pub fn reason(&self) -> Option<&str> {
        self.body.get("reason").and_then(serde_json::Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.body.get(key)
    }

    /// Decodes the body into `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.body).map_err(|e| ControllerError::Decode(e.to_string()))
    }
}

/// A sent command whose response has not been awaited yet
///
/// Dropping it gives up the response; a response arriving afterwards goes
/// to the next waiter for the same id, or is dropped.
#[derive(Debug)]
pub struct PendingResponse {
    correlator: Arc<Correlator>,
    response_id: u8,
    ticket: Ticket,
    rx: oneshot::Receiver<Delivery>,
}

impl PendingResponse {
    pub fn response_id(&self) -> u8 {
        self.response_id
    }

    /// Waits up to `timeout` for the response
    pub async fn await_response(mut self, timeout: Duration) -> Result<Envelope> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(delivery)) => delivery,
            Ok(Err(_)) => Err(ControllerError::ChannelClosed),
            Err(_) => Err(ControllerError::Timeout {
                response_id: self.response_id,
                timeout,
            }),
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        self.correlator.deregister(self.response_id, self.ticket);
    }
}

/// Handle for issuing commands to the connected agent
#[derive(Clone)]
pub struct Controller {
    correlator: Arc<Correlator>,
    outgoing_tx: mpsc::Sender<Frame>,
    link: watch::Receiver<LinkStatus>,
    request_timeout: Duration,
}

impl Controller {
    /// Starts a router on an existing channel pair
    pub fn new(
        config: &ControllerConfig,
        events_rx: mpsc::Receiver<TransportEvent>,
        outgoing_tx: mpsc::Sender<Frame>,
    ) -> Self {
        let correlator = Arc::new(Correlator::new());
        let (link_tx, link_rx) = watch::channel(LinkStatus::default());

        let router = ResponseRouter::new(correlator.clone(), link_tx);
        tokio::spawn(router.run(events_rx));

        Self {
            correlator,
            outgoing_tx,
            link: link_rx,
            request_timeout: config.request_timeout,
        }
    }

    /// Starts `transport` and a router on background tasks
    pub fn spawn<T: Transport>(config: &ControllerConfig, transport: T) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(config.channel_capacity);

        tokio::spawn(async move {
            if let Err(e) = transport.run(events_tx, outgoing_rx).await {
                tracing::error!(error = %e, "Controller transport stopped");
            }
        });

        Self::new(config, events_rx, outgoing_tx)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.borrow().clone()
    }

    /// Outstanding waiters across all response ids
    pub fn pending_requests(&self) -> usize {
        self.correlator.total_pending()
    }

    /// Waits until an agent is connected
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        self.wait_link(LinkState::Connected, timeout, |s| s.state.is_connected())
            .await
    }

    /// Waits until the connected agent has sent a heartbeat
    pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        self.wait_link(LinkState::Ready, timeout, |s| s.state.is_ready())
            .await
    }

    async fn wait_link(
        &self,
        expected: LinkState,
        timeout: Duration,
        reached: impl FnMut(&LinkStatus) -> bool,
    ) -> Result<()> {
        let mut link = self.link.clone();
        let result = match tokio::time::timeout(timeout, link.wait_for(reached)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ControllerError::ChannelClosed),
            Err(_) => Err(ControllerError::LinkTimeout { expected, timeout }),
        };
        result
    }

    /// Sends a raw command and registers for its response
    ///
    /// The waiter is registered before the packet is written, so the
    /// response cannot outrun it.
    pub async fn send(&self, command: u8, payload: impl Into<Bytes>) -> Result<PendingResponse> {
        let packet = Packet::new(command, payload).map_err(ProtocolError::from)?;
        let response_id = expected_response_id(command);

        let (ticket, rx) = self.correlator.register(response_id);
        let pending = PendingResponse {
            correlator: self.correlator.clone(),
            response_id,
            ticket,
            rx,
        };

        tracing::debug!(command, response_id, len = packet.payload().len(), "Sending command");
        self.outgoing_tx
            .send(Frame::Binary(packet.encode()))
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;

        Ok(pending)
    }

    /// Sends `request` and waits for its response
    pub async fn request_with_timeout(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Envelope> {
        let pending = self
            .send(request.command().id(), request.encode_payload())
            .await?;
        pending.await_response(timeout).await
    }

    /// Sends `request` with the configured timeout
    pub async fn request(&self, request: &Request) -> Result<Envelope> {
        self.request_with_timeout(request, self.request_timeout).await
    }

    pub async fn hello(&self) -> Result<Envelope> {
        self.request(&Request::Hello).await
    }

    pub async fn hello_with_timeout(&self, timeout: Duration) -> Result<Envelope> {
        self.request_with_timeout(&Request::Hello, timeout).await
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        let response: StatusResponse = self.request(&Request::Status).await?.decode()?;
        Ok(response.status)
    }

    pub async fn groups(&self, query: ListQuery) -> Result<GroupList> {
        self.request(&Request::ListGroups(query)).await?.decode()
    }

    pub async fn songs(&self, query: ListQuery) -> Result<SongList> {
        self.request(&Request::ListSongs(query)).await?.decode()
    }

    pub async fn start_song(&self, song_dir: &str, difficulty: &str) -> Result<Envelope> {
        self.request(&Request::StartSong(StartSong::new(song_dir, difficulty)))
            .await
    }

    pub async fn set_paused(&self, paused: bool) -> Result<Envelope> {
        self.request(&Request::SetPaused(SetPaused { paused })).await
    }

    pub async fn stop(&self) -> Result<Envelope> {
        self.request(&Request::Stop).await
    }
}
