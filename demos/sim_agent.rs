//! Simulated game agent
//!
//! Connects to a controller and answers commands from a `SimHost` that
//! sits on the music wheel with P1 joined. While a song is playing it
//! "hits" a note every 250 ms so live stats move.
//!
//! Run with:
//! ```sh
//! cargo run --example sim_agent -- ws://127.0.0.1:8765
//! ```
//!
//! Pair it with the `itg-harness` binary or the `probe_controller` demo.

use std::time::Duration;

use itg_remote::agent::transport::websocket::WebSocketClient;
use itg_remote::agent::{Agent, AgentConfig, SimHost};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = AgentConfig::default();
    if let Some(url) = std::env::args().nth(1) {
        config.controller_url = url;
    }

    let host = SimHost::ready();
    tracing::info!(url = %config.controller_url, "Starting simulated agent");

    let player = host.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(250)).await;
            player.play_notes(1);
        }
    });

    let transport = WebSocketClient::new(config.controller_url.clone())
        .with_reconnect_delay(config.reconnect_delay);
    let agent = Agent::spawn(host, config, transport);

    tokio::select! {
        result = agent.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Agent stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopped");
        }
    }
}
