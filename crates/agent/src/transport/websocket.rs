use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{Frame, Transport, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client that keeps reconnecting to the controller
///
/// Every established connection is reported as [`TransportEvent::Connected`]
/// and every loss as [`TransportEvent::Disconnected`]. Frames handed to the
/// transport while no connection is up are dropped.
pub struct WebSocketClient {
    url: String,
    reconnect_delay: Duration,
}

impl WebSocketClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(1),
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Waits out the reconnect delay, dropping frames queued meanwhile
    ///
    /// Returns `false` once the loop side has gone away.
    async fn wait_reconnect(&self, outgoing_rx: &mut mpsc::Receiver<Frame>) -> bool {
        let delay = tokio::time::sleep(self.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                _ = &mut delay => return true,
                frame = outgoing_rx.recv() => match frame {
                    Some(frame) => {
                        tracing::debug!(len = frame.len(), "Dropping frame while disconnected");
                    }
                    None => return false,
                },
            }
        }
    }
}

/// Why a connection ended
enum ConnectionEnd {
    Lost,
    Shutdown,
}

async fn pump(
    ws_stream: WsStream,
    events_tx: &mpsc::Sender<TransportEvent>,
    outgoing_rx: &mut mpsc::Receiver<Frame>,
) -> ConnectionEnd {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let frame = match msg {
                    Some(Ok(Message::Binary(data))) => Frame::Binary(Bytes::from(data)),
                    Some(Ok(Message::Text(text))) => Frame::Text(text),
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Controller closed connection");
                        return ConnectionEnd::Lost;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket error");
                        return ConnectionEnd::Lost;
                    }
                    None => {
                        tracing::info!("Connection closed");
                        return ConnectionEnd::Lost;
                    }
                };

                if events_tx.send(TransportEvent::Frame(frame)).await.is_err() {
                    return ConnectionEnd::Shutdown;
                }
            }

            frame = outgoing_rx.recv() => {
                let message = match frame {
                    Some(Frame::Binary(bytes)) => Message::Binary(bytes.to_vec()),
                    Some(Frame::Text(text)) => Message::Text(text),
                    None => {
                        let _ = ws_sender.close().await;
                        return ConnectionEnd::Shutdown;
                    }
                };

                if let Err(e) = ws_sender.send(message).await {
                    tracing::warn!(error = %e, "Failed to send message");
                    return ConnectionEnd::Lost;
                }
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketClient {
    type Error = WebSocketClientError;

    async fn run(
        self,
        events_tx: mpsc::Sender<TransportEvent>,
        mut outgoing_rx: mpsc::Receiver<Frame>,
    ) -> Result<(), Self::Error> {
        loop {
            tracing::debug!(url = %self.url, "Connecting to controller");

            match connect_async(&self.url).await {
                Ok((ws_stream, _)) => {
                    tracing::info!(url = %self.url, "Connected to controller");
                    if events_tx.send(TransportEvent::Connected).await.is_err() {
                        return Ok(());
                    }

                    let end = pump(ws_stream, &events_tx, &mut outgoing_rx).await;
                    let _ = events_tx.send(TransportEvent::Disconnected).await;
                    if let ConnectionEnd::Shutdown = end {
                        return Ok(());
                    }
                }
                Err(e @ (tungstenite::Error::Url(_) | tungstenite::Error::HttpFormat(_))) => {
                    return Err(WebSocketClientError::InvalidUrl(e.to_string()));
                }
                Err(e) => {
                    tracing::debug!(url = %self.url, error = %e, "Connection attempt failed");
                }
            }

            if events_tx.is_closed() || !self.wait_reconnect(&mut outgoing_rx).await {
                return Ok(());
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebSocketClientError {
    #[error("Invalid controller URL: {0}")]
    InvalidUrl(String),
}
