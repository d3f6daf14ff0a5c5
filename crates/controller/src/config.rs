use std::net::SocketAddr;
use std::time::Duration;

/// Controller runtime settings
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Address the WebSocket server listens on
    pub bind_addr: SocketAddr,

    /// Default wait for a single response
    pub request_timeout: Duration,

    /// Wait for the first heartbeat after the agent connects
    pub ready_timeout: Duration,

    pub channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8765)),
            request_timeout: Duration::from_secs(10),
            ready_timeout: Duration::from_secs(15),
            channel_capacity: 256,
        }
    }
}
