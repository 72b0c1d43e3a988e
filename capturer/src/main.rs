mod clock;
mod filter;
mod keys;
mod session;
mod source;
mod storage;

use framesnap_common::config::Config;
use session::{CaptureSession, Command};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source_kind = config.source.kind.as_str(),
        output_dir = config.output.dir.display().to_string(),
        interval_ms = config.poll.interval_ms,
        stability_threshold_pct = config.detector.stability_threshold_pct,
        stability_count = config.detector.stability_count,
        novelty_threshold_pct = config.detector.novelty_threshold_pct,
        "starting framesnap"
    );

    let mut session = CaptureSession::new(
        source::desktop_provider(),
        Box::new(storage::JpegDirSink::new(&config.output)),
        Box::new(clock::SystemClock),
        config.source.clone(),
        config.region.map(Into::into),
        config.detector,
    );

    if let Err(e) = session.refresh_sources() {
        warn!(error = %e, "could not list capture sources; retry with `sources`");
    }

    let (tx, rx) = mpsc::channel::<Command>(16);
    if config.source.autostart {
        tx.send(Command::Start).await.ok();
        if config.source.auto_capture {
            tx.send(Command::Auto(true)).await.ok();
        }
    }
    session::spawn_stdin_reader(tx);

    info!(
        "commands: sources | select <id> | start | stop | auto on|off | snap | \
         region <x> <y> <w> <h> | thresholds <pct> <count> <pct> | status | quit"
    );
    session::run(session, rx, Duration::from_millis(config.poll.interval_ms)).await;
}
