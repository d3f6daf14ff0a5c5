//! Play-cycle harness for an ITGmania agent.
//!
//! Listens for the agent, then repeatedly starts a song, watches live
//! stats, pauses, resumes and stops it. Each cycle is printed as a JSON
//! line (or appended to `--report`). Stats samples are appended to
//! `--timeseries` when given.
//!
//!   cargo run -p itg-remote-controller --bin itg-harness -- --cycles 3 --stats-seconds 20

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use itg_remote_controller::harness::{Harness, HarnessConfig};
use itg_remote_controller::transport::websocket::WebSocketServer;
use itg_remote_controller::{Controller, ControllerConfig};

#[derive(Parser, Debug)]
#[command(name = "itg-harness")]
#[command(about = "Drive an ITGmania agent through scripted play cycles")]
struct Args {
    /// Address to listen on for the agent
    #[arg(long, default_value = "127.0.0.1:8765")]
    bind: SocketAddr,

    /// Number of cycles to run
    #[arg(long, default_value_t = 5)]
    cycles: usize,

    /// Length of the live stats window, in seconds
    #[arg(long, default_value_t = 12.0)]
    stats_seconds: f64,

    /// Delay between stats samples, in seconds
    #[arg(long, default_value_t = 0.25)]
    poll_interval: f64,

    /// Skip the pause/resume steps
    #[arg(long)]
    no_pause: bool,

    /// Default response timeout, in seconds
    #[arg(long, default_value_t = 10.0)]
    request_timeout: f64,

    /// Append cycle reports to this file instead of stdout
    #[arg(long)]
    report: Option<PathBuf>,

    /// Append one JSON line per stats sample to this file
    #[arg(long)]
    timeseries: Option<PathBuf>,
}

fn append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn seconds(value: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    Ok(Duration::try_from_secs_f64(value)?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    let controller_config = ControllerConfig {
        bind_addr: args.bind,
        request_timeout: seconds(args.request_timeout)?,
        ..ControllerConfig::default()
    };
    let harness_config = HarnessConfig {
        cycles: args.cycles,
        stats_duration: seconds(args.stats_seconds)?,
        poll_interval: seconds(args.poll_interval)?,
        pause_resume: !args.no_pause,
        ready_timeout: controller_config.ready_timeout,
        ..HarnessConfig::default()
    };

    let server = WebSocketServer::bind(controller_config.bind_addr).await?;
    tracing::info!(addr = %server.local_addr(), "Listening for the agent");

    let controller = Controller::spawn(&controller_config, server);
    let harness = Harness::new(controller, harness_config);

    let mut out: Box<dyn Write> = match &args.report {
        Some(path) => {
            tracing::info!(path = %path.display(), "Appending cycle reports");
            Box::new(append(path)?)
        }
        None => Box::new(std::io::stdout()),
    };
    let mut timeseries: Box<dyn Write> = match &args.timeseries {
        Some(path) => {
            tracing::info!(path = %path.display(), "Appending stats samples");
            Box::new(append(path)?)
        }
        None => Box::new(std::io::sink()),
    };

    tokio::select! {
        result = harness.run(&mut out, &mut timeseries) => {
            let reports = result?;
            let failed = reports.iter().filter(|r| !r.passed_all).count();
            tracing::info!(cycles = reports.len(), failed, "Harness finished");
            if failed > 0 {
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Stopped");
        }
    }

    Ok(())
}
