use framesnap_common::config::DetectorConfig;
use framesnap_common::frame::Frame;
use tracing::{debug, info, warn};

use super::diff::{percent_different, DiffError};

/// Everything the detector remembers between polls.
#[derive(Debug, Clone, Default)]
pub struct DetectorState {
    /// Frame sampled on the previous poll; the stability reference.
    pub previous: Option<Frame>,
    /// Frame saved at the last capture (or adopted as the first stable
    /// frame); the novelty reference.
    pub baseline: Option<Frame>,
    /// Consecutive quiet polls, saturating at `stability_count`.
    pub stable_count: u32,
}

#[derive(Debug)]
pub enum Decision {
    /// The scene is moving, or has not been quiet for long enough.
    Unsettled,
    /// First stable frame with no baseline: it becomes the baseline, nothing is saved.
    BaselineAdopted,
    /// Stable, but too close to the last saved frame.
    Duplicate { novelty_pct: f64 },
    /// Stable and novel: persist `frame`.
    Capture { frame: Frame, novelty_pct: f64 },
}

#[derive(Debug)]
pub struct Evaluation {
    pub decision: Decision,
    /// Difference to the previous poll, in percent.
    pub diff_pct: f64,
    pub state: DetectorState,
}

/// One poll of the change detector.
///
/// A poll is quiet when its difference to the previous poll is *at or below*
/// `stability_threshold_pct`; the very first poll has nothing to compare
/// against and counts as quiet. Once `stability_count` quiet polls have been
/// seen in a row, the frame is compared with the baseline and captured when
/// that difference is at least `novelty_threshold_pct`. An empty frame is
/// always unsettled.
///
/// Fails with [`DiffError::InvalidInput`] when `current` does not have the
/// dimensions of the frames held in `state`.
pub fn evaluate(
    current: Frame,
    mut state: DetectorState,
    config: &DetectorConfig,
) -> Result<Evaluation, DiffError> {
    let diff_pct = match &state.previous {
        Some(prev) => percent_different(&current, prev)?,
        None => 0.0,
    };

    // An empty region has nothing to settle on.
    if current.pixel_count() == 0 {
        state.stable_count = 0;
        state.previous = Some(current);
        return Ok(Evaluation {
            decision: Decision::Unsettled,
            diff_pct,
            state,
        });
    }

    if diff_pct <= config.stability_threshold_pct {
        state.stable_count = state
            .stable_count
            .saturating_add(1)
            .min(config.stability_count);
    } else {
        state.stable_count = 0;
    }

    let decision = if state.stable_count < config.stability_count {
        Decision::Unsettled
    } else {
        match &state.baseline {
            None => {
                state.baseline = Some(current.clone());
                Decision::BaselineAdopted
            }
            Some(baseline) => {
                let novelty_pct = percent_different(&current, baseline)?;
                if novelty_pct >= config.novelty_threshold_pct {
                    state.baseline = Some(current.clone());
                    Decision::Capture {
                        frame: current.clone(),
                        novelty_pct,
                    }
                } else {
                    Decision::Duplicate { novelty_pct }
                }
            }
        }
    };

    state.previous = Some(current);
    Ok(Evaluation {
        decision,
        diff_pct,
        state,
    })
}

/// Auto-capture driver: owns the thresholds and the state threaded through
/// [`evaluate`].
pub struct ChangeDetector {
    config: DetectorConfig,
    state: DetectorState,
}

impl ChangeDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::default(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Forget both reference frames and the quiet streak.
    pub fn reset(&mut self) {
        self.state = DetectorState::default();
    }

    /// Feed one polled frame; returns the frame to save when the detector
    /// decides to capture. A frame whose size differs from the previous one
    /// restarts detection from scratch.
    pub fn observe(&mut self, frame: Frame) -> Option<Frame> {
        if let Some(prev) = &self.state.previous {
            if prev.dimensions() != frame.dimensions() {
                warn!(
                    previous = ?prev.dimensions(),
                    current = ?frame.dimensions(),
                    "region size changed, resetting detector"
                );
                self.reset();
            }
        }

        let seq = frame.seq;
        let state = std::mem::take(&mut self.state);
        let eval = match evaluate(frame, state, &self.config) {
            Ok(eval) => eval,
            Err(e) => {
                warn!(error = %e, seq, "frame not comparable, detector reset");
                return None;
            }
        };
        self.state = eval.state;

        debug!(
            seq,
            diff_pct = format!("{:.2}", eval.diff_pct),
            threshold = self.config.stability_threshold_pct,
            stable_count = self.state.stable_count,
            required = self.config.stability_count,
            "stability check"
        );

        match eval.decision {
            Decision::Unsettled => None,
            Decision::BaselineAdopted => {
                info!(seq, "scene settled, baseline adopted");
                None
            }
            Decision::Duplicate { novelty_pct } => {
                debug!(
                    seq,
                    novelty_pct = format!("{:.2}", novelty_pct),
                    threshold = self.config.novelty_threshold_pct,
                    "stable but unchanged since last capture"
                );
                None
            }
            Decision::Capture { frame, novelty_pct } => {
                info!(
                    seq,
                    novelty_pct = format!("{:.2}", novelty_pct),
                    threshold = self.config.novelty_threshold_pct,
                    "scene settled on new content, capturing"
                );
                Some(frame)
            }
        }
    }
}
