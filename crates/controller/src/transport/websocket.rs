use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use super::{Frame, Transport, TransportEvent};

const CONNECTION_QUEUE: usize = 64;

/// WebSocket server holding at most one agent connection
///
/// A newly accepted connection replaces the current one: the router sees
/// `Disconnected` followed by `Connected`, and anything still arriving on
/// the old connection is ignored.
pub struct WebSocketServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl WebSocketServer {
    /// Binds the listening socket
    pub async fn bind(addr: SocketAddr) -> Result<Self, WebSocketServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| WebSocketServerError::BindError(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| WebSocketServerError::BindError(e.to_string()))?;

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound, useful with port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// What a connection task reports back to the accept loop
enum ConnectionEvent {
    Opened(mpsc::Sender<Frame>, SocketAddr),
    Frame(Frame),
    Closed,
}

type Tagged = (u64, ConnectionEvent);

/// Handshakes and pumps a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    generation: u64,
    report_tx: mpsc::Sender<Tagged>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            tracing::warn!(peer = %peer_addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    tracing::debug!(peer = %peer_addr, generation, "WebSocket handshake completed");

    let (frame_tx, mut frame_rx) = mpsc::channel(CONNECTION_QUEUE);
    if report_tx
        .send((generation, ConnectionEvent::Opened(frame_tx, peer_addr)))
        .await
        .is_err()
    {
        return;
    }

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let frame = match msg {
                    Some(Ok(Message::Binary(data))) => Frame::Binary(Bytes::from(data)),
                    Some(Ok(Message::Text(text))) => Frame::Text(text),
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(peer = %peer_addr, "Agent closed connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(peer = %peer_addr, error = %e, "WebSocket error");
                        break;
                    }
                    None => {
                        tracing::info!(peer = %peer_addr, "Connection closed");
                        break;
                    }
                };

                if report_tx.send((generation, ConnectionEvent::Frame(frame))).await.is_err() {
                    return;
                }
            }

            frame = frame_rx.recv() => {
                let message = match frame {
                    Some(Frame::Binary(bytes)) => Message::Binary(bytes.to_vec()),
                    Some(Frame::Text(text)) => Message::Text(text),
                    // Replaced by a newer connection
                    None => {
                        let _ = ws_sender.close().await;
                        return;
                    }
                };

                if let Err(e) = ws_sender.send(message).await {
                    tracing::warn!(peer = %peer_addr, error = %e, "Failed to send message");
                    break;
                }
            }
        }
    }

    let _ = report_tx.send((generation, ConnectionEvent::Closed)).await;
}

struct Current {
    generation: u64,
    peer_addr: SocketAddr,
    frame_tx: mpsc::Sender<Frame>,
}

#[async_trait]
impl Transport for WebSocketServer {
    type Error = WebSocketServerError;

    async fn run(
        self,
        events_tx: mpsc::Sender<TransportEvent>,
        mut outgoing_rx: mpsc::Receiver<Frame>,
    ) -> Result<(), Self::Error> {
        tracing::info!(addr = %self.local_addr, "WebSocket server listening");

        let (report_tx, mut report_rx) = mpsc::channel::<Tagged>(CONNECTION_QUEUE);
        let mut next_generation = 0u64;
        let mut current: Option<Current> = None;

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => match accept_result {
                    Ok((stream, peer_addr)) => {
                        next_generation += 1;
                        tracing::info!(peer = %peer_addr, generation = next_generation, "New connection");
                        tokio::spawn(handle_connection(
                            stream,
                            peer_addr,
                            next_generation,
                            report_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                },

                Some((generation, event)) = report_rx.recv() => {
                    let is_current = current.as_ref().map(|c| c.generation) == Some(generation);

                    let forward = match event {
                        ConnectionEvent::Opened(frame_tx, peer_addr) => {
                            let mut events = Vec::with_capacity(2);
                            if let Some(old) = current.take() {
                                tracing::info!(old = %old.peer_addr, new = %peer_addr, "Replacing agent connection");
                                events.push(TransportEvent::Disconnected);
                            }
                            current = Some(Current { generation, peer_addr, frame_tx });
                            events.push(TransportEvent::Connected);
                            events
                        }
                        ConnectionEvent::Frame(frame) if is_current => vec![TransportEvent::Frame(frame)],
                        ConnectionEvent::Closed if is_current => {
                            current = None;
                            vec![TransportEvent::Disconnected]
                        }
                        ConnectionEvent::Frame(_) | ConnectionEvent::Closed => {
                            tracing::debug!(generation, "Ignoring event from replaced connection");
                            Vec::new()
                        }
                    };

                    for event in forward {
                        if events_tx.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                }

                frame = outgoing_rx.recv() => {
                    let Some(frame) = frame else {
                        tracing::info!("WebSocket server shutting down");
                        return Ok(());
                    };

                    match &current {
                        Some(conn) => {
                            if conn.frame_tx.send(frame).await.is_err() {
                                tracing::debug!(peer = %conn.peer_addr, "Connection gone, frame dropped");
                            }
                        }
                        None => {
                            tracing::debug!(len = frame.len(), "No agent connected, frame dropped");
                        }
                    }
                }
            }
        }
    }
}

/// WebSocket server errors
#[derive(Debug, thiserror::Error)]
pub enum WebSocketServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_tungstenite::connect_async;

    const WAIT: Duration = Duration::from_secs(2);

    async fn start() -> (
        SocketAddr,
        mpsc::Receiver<TransportEvent>,
        mpsc::Sender<Frame>,
    ) {
        let server = WebSocketServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr();

        let (events_tx, events_rx) = mpsc::channel(16);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(16);
        tokio::spawn(server.run(events_tx, outgoing_rx));

        (addr, events_rx, outgoing_tx)
    }

    async fn next_event(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_server_exchanges_frames() {
        let (addr, mut events, outgoing) = start().await;

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

        ws.send(Message::Binary(vec![0x00, 0x01, 0x81])).await.unwrap();
        ws.send(Message::Text("SCREEN|name=ScreenGameplay".into()))
            .await
            .unwrap();

        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Frame(Frame::Binary(Bytes::from_static(&[0x00, 0x01, 0x81])))
        );
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Frame(Frame::Text("SCREEN|name=ScreenGameplay".into()))
        );

        outgoing
            .send(Frame::Binary(Bytes::from_static(&[0x00, 0x01, 0x01])))
            .await
            .unwrap();
        let msg = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(msg, Message::Binary(vec![0x00, 0x01, 0x01]));

        ws.close(None).await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_new_connection_replaces_current() {
        let (addr, mut events, _outgoing) = start().await;
        let url = format!("ws://{}", addr);

        let (mut first, _) = connect_async(&url).await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

        let (mut second, _) = connect_async(&url).await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Disconnected);
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

        // The replaced connection is closed by the server
        let closed = timeout(WAIT, async {
            loop {
                match first.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        second.send(Message::Text("hi".into())).await.unwrap();
        assert_eq!(
            next_event(&mut events).await,
            TransportEvent::Frame(Frame::Text("hi".into()))
        );
    }

    #[tokio::test]
    async fn test_frames_dropped_without_connection() {
        let (addr, mut events, outgoing) = start().await;

        outgoing
            .send(Frame::Text("nobody home".into()))
            .await
            .unwrap();
        while outgoing.capacity() < outgoing.max_capacity() {
            tokio::task::yield_now().await;
        }

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

        outgoing.send(Frame::Text("hello".into())).await.unwrap();
        let msg = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        assert_eq!(msg, Message::Text("hello".into()));
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let server = WebSocketServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let err = WebSocketServer::bind(server.local_addr()).await;
        assert!(matches!(err, Err(WebSocketServerError::BindError(_))));
    }
}
