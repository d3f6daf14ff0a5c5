use std::time::Duration;

/// Agent runtime settings
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// WebSocket URL of the controller
    pub controller_url: String,

    /// Delay between two ticks of the event loop
    pub tick_interval: Duration,

    pub heartbeat_interval: Duration,

    /// Wait before reconnecting after the connection is lost
    pub reconnect_delay: Duration,

    /// Capacity of the channels between the loop and the transport
    pub channel_capacity: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            controller_url: "ws://127.0.0.1:8765".to_string(),
            tick_interval: Duration::from_millis(100),
            heartbeat_interval: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(1),
            channel_capacity: 256,
        }
    }
}
