//! In-memory transport for tests and demos
//!
//! A pair of transports joined by channels. Each side reports
//! [`TransportEvent::Connected`] as soon as it runs, and
//! [`TransportEvent::Disconnected`] once the peer goes away.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Frame, Transport, TransportEvent};

pub struct MemoryTransport {
    to_peer: mpsc::Sender<Frame>,
    from_peer: mpsc::Receiver<Frame>,
}

impl MemoryTransport {
    pub fn new(to_peer: mpsc::Sender<Frame>, from_peer: mpsc::Receiver<Frame>) -> Self {
        Self { to_peer, from_peer }
    }

    /// Creates two transports wired to each other
    ///
    /// ```
    /// use itg_remote_protocol::transport::memory::MemoryTransport;
    ///
    /// let (agent_side, controller_side) = MemoryTransport::create_pair(64);
    /// ```
    pub fn create_pair(buffer_size: usize) -> (Self, Self) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::channel(buffer_size);
        let (b_to_a_tx, b_to_a_rx) = mpsc::channel(buffer_size);

        (
            Self::new(a_to_b_tx, b_to_a_rx),
            Self::new(b_to_a_tx, a_to_b_rx),
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Error = MemoryTransportError;

    async fn run(
        mut self,
        events_tx: mpsc::Sender<TransportEvent>,
        mut outgoing_rx: mpsc::Receiver<Frame>,
    ) -> Result<(), Self::Error> {
        events_tx
            .send(TransportEvent::Connected)
            .await
            .map_err(|_| MemoryTransportError::ChannelClosed)?;

        loop {
            tokio::select! {
                frame = self.from_peer.recv() => {
                    match frame {
                        Some(frame) => {
                            if events_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                                return Err(MemoryTransportError::ChannelClosed);
                            }
                        }
                        None => {
                            tracing::debug!("Memory peer closed");
                            let _ = events_tx.send(TransportEvent::Disconnected).await;
                            return Ok(());
                        }
                    }
                }

                frame = outgoing_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            if self.to_peer.send(frame).await.is_err() {
                                let _ = events_tx.send(TransportEvent::Disconnected).await;
                                return Ok(());
                            }
                        }
                        None => return Ok(()),
                    }
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryTransportError {
    #[error("Transport channel closed")]
    ChannelClosed,
}
