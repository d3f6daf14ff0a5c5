pub mod websocket;

pub use itg_remote_protocol::transport::memory;
pub use itg_remote_protocol::transport::{Frame, Transport, TransportEvent};

/// Default transport type (WebSocket)
pub type DefaultTransport = websocket::WebSocketServer;
