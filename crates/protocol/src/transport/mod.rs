//! Transport layer abstraction
//!
//! Both ends of the channel talk to a transport through a pair of channels:
//! frames going out, and [`TransportEvent`]s coming in. This keeps the agent
//! loop and the controller router independent of WebSocket details.

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// One transport-level message
///
/// Binary frames carry packet bytes (possibly several packets, possibly a
/// fragment of one). Text frames carry beacon lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Binary(Bytes),
    Text(String),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Binary(bytes) => bytes.len(),
            Frame::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer connection was established
    Connected,

    /// A frame arrived from the peer
    Frame(Frame),

    /// The peer connection was lost
    Disconnected,
}

/// Transport layer abstraction for network communication
///
/// # Example: Implementing a custom transport
///
/// ```no_run
/// use async_trait::async_trait;
/// use itg_remote_protocol::transport::{Frame, Transport, TransportEvent};
/// use tokio::sync::mpsc;
///
/// struct LoopbackTransport;
///
/// #[async_trait]
/// impl Transport for LoopbackTransport {
///     type Error = std::io::Error;
///
///     async fn run(
///         self,
///         events_tx: mpsc::Sender<TransportEvent>,
///         mut outgoing_rx: mpsc::Receiver<Frame>,
///     ) -> Result<(), Self::Error> {
///         let _ = events_tx.send(TransportEvent::Connected).await;
///         while let Some(frame) = outgoing_rx.recv().await {
///             let _ = events_tx.send(TransportEvent::Frame(frame)).await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs the transport until it is shut down
    ///
    /// Received frames and connection changes are reported on `events_tx`;
    /// frames read from `outgoing_rx` are written to the current peer.
    /// Returns once either channel is closed.
    async fn run(
        self,
        events_tx: mpsc::Sender<TransportEvent>,
        outgoing_rx: mpsc::Receiver<Frame>,
    ) -> Result<(), Self::Error>;
}
