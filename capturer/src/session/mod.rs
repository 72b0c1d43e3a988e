pub mod control;
mod state;

pub use control::{spawn_stdin_reader, Command};
pub use state::CaptureSession;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Drive the session: poll on `interval` while auto-capture is on, and apply
/// commands between polls. Returns on `Quit`, when every command sender is
/// gone, or on Ctrl-C.
pub async fn run(
    mut session: CaptureSession,
    mut commands: mpsc::Receiver<Command>,
    interval: Duration,
) -> CaptureSession {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut polls: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick(), if session.is_polling() => {
                polls += 1;
                if let Err(e) = session.tick() {
                    warn!(error = %e, "poll failed, continuing");
                }
                if polls % 100 == 0 {
                    debug!(polls, "polls processed");
                }
            }
            command = commands.recv() => match command {
                None | Some(Command::Quit) => break,
                Some(command) => {
                    let was_polling = session.is_polling();
                    if let Err(e) = session.apply(command) {
                        warn!(error = %e, "command failed");
                    }
                    if !was_polling && session.is_polling() {
                        ticker.reset();
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if session.is_live() {
        let _ = session.stop();
    }
    info!(polls, "capture loop finished");
    session
}
