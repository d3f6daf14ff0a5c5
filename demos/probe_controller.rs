//! Controller probe
//!
//! Listens for an agent, then walks through every command once and
//! prints the responses.
//!
//! Run with:
//! ```sh
//! cargo run --example probe_controller
//! cargo run --example sim_agent      # in another terminal
//! ```

use std::time::Duration;

use itg_remote::controller::transport::websocket::WebSocketServer;
use itg_remote::controller::{Controller, ControllerConfig};
use itg_remote::protocol::ListQuery;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ControllerConfig::default();
    let server = WebSocketServer::bind(config.bind_addr).await?;
    println!("=== itg-remote probe ===");
    println!("Listening on ws://{}\n", server.local_addr());

    let controller = Controller::spawn(&config, server);
    controller.wait_connected(Duration::from_secs(300)).await?;
    controller.wait_ready(config.ready_timeout).await?;

    let hello = controller.hello().await?;
    println!("hello   -> {}", hello.body);

    let status = controller.status().await?;
    println!("status  -> screen={} playing={}", status.screen, status.is_playing);

    let groups = controller.groups(ListQuery::default()).await?;
    println!("groups  -> {:?} (total {})", groups.groups, groups.total);

    let songs = controller.songs(ListQuery::new(5, "")).await?;
    for song in &songs.songs {
        println!("song    -> {} [{}] {:?}", song.title, song.song_dir, song.difficulties);
    }

    let Some(song) = songs.songs.first() else {
        println!("\nNo songs to play");
        return Ok(());
    };
    let Some(difficulty) = song.difficulties.first() else {
        println!("\n{} has no charts", song.title);
        return Ok(());
    };

    let started = controller.start_song(&song.song_dir, difficulty).await?;
    println!("start   -> {}", started.body);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let status = controller.status().await?;
    println!(
        "status  -> screen={} score_p1={:?} combo_p1={:?}",
        status.screen, status.score_p1, status.current_combo_p1
    );

    println!("pause   -> {}", controller.set_paused(true).await?.body);
    println!("resume  -> {}", controller.set_paused(false).await?.body);
    println!("stop    -> {}", controller.stop().await?.body);

    Ok(())
}
