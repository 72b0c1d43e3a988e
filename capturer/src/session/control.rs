use std::str::FromStr;

use framesnap_common::config::DetectorConfig;
use framesnap_common::frame::CaptureRegion;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One user action, read as a line from stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Re-enumerate capturable sources.
    Sources,
    /// Choose the source for the next `start`.
    Select(String),
    Start,
    Stop,
    /// Turn auto-capture on or off.
    Auto(bool),
    /// Save the current region right now.
    Snap,
    Region(CaptureRegion),
    Thresholds(DetectorConfig),
    Status,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ControlError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for Command {
    type Err = ControlError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(ControlError::Unknown(String::new()));
        };
        let args: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("sources" | "refresh", []) => Command::Sources,
            ("select", [id]) => Command::Select((*id).to_string()),
            ("select", _) => return Err(ControlError::Usage("select <id>")),
            ("start", []) => Command::Start,
            ("stop", []) => Command::Stop,
            ("auto", ["on"]) => Command::Auto(true),
            ("auto", ["off"]) => Command::Auto(false),
            ("auto", _) => return Err(ControlError::Usage("auto on|off")),
            ("snap", []) => Command::Snap,
            ("region", [x, y, w, h]) => {
                let usage = || ControlError::Usage("region <x> <y> <width> <height>");
                Command::Region(CaptureRegion::new(
                    x.parse().map_err(|_| usage())?,
                    y.parse().map_err(|_| usage())?,
                    w.parse().map_err(|_| usage())?,
                    h.parse().map_err(|_| usage())?,
                ))
            }
            ("region", _) => return Err(ControlError::Usage("region <x> <y> <width> <height>")),
            ("thresholds", [stability, count, novelty]) => {
                let usage =
                    || ControlError::Usage("thresholds <stability_pct> <count> <novelty_pct>");
                Command::Thresholds(DetectorConfig {
                    stability_threshold_pct: stability.parse().map_err(|_| usage())?,
                    stability_count: count.parse().map_err(|_| usage())?,
                    novelty_threshold_pct: novelty.parse().map_err(|_| usage())?,
                })
            }
            ("thresholds", _) => {
                return Err(ControlError::Usage(
                    "thresholds <stability_pct> <count> <novelty_pct>",
                ))
            }
            ("status", []) => Command::Status,
            ("quit" | "exit", []) => Command::Quit,
            _ => return Err(ControlError::Unknown(line.trim().to_string())),
        };
        Ok(command)
    }
}

/// Forward stdin lines as commands until EOF, which is sent on as `Quit`.
pub fn spawn_stdin_reader(tx: mpsc::Sender<Command>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Command>() {
                Ok(cmd) => {
                    debug!(?cmd, "command received");
                    if tx.send(cmd).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "ignoring input"),
            }
        }
        let _ = tx.send(Command::Quit).await;
    });
}
