use std::path::PathBuf;

use chrono::{DateTime, Local};
use framesnap_common::config::{DetectorConfig, SourceConfig};
use framesnap_common::frame::{CaptureRegion, Frame};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::filter::ChangeDetector;
use crate::source::{parse_id, resolve, FrameSource, SourceError, SourceInfo, SourceProvider};
use crate::storage::{FrameSink, SinkError};

use super::control::Command;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("capture is already running; stop it first")]
    AlreadyLive,
    #[error("capture is not running")]
    NotLive,
    #[error("no capture source selected")]
    NoSourceSelected,
    #[error("thresholds are locked while auto capture is on")]
    AutoCaptureActive,
}

enum SessionState {
    /// No source open; sources may be listed and selected.
    Stopped,
    /// A source is open and the region can be sampled.
    Live(Live),
}

struct Live {
    source: Box<dyn FrameSource>,
    width: u32,
    height: u32,
    /// Region clamped to the current source size.
    region: CaptureRegion,
    /// Present while auto-capture is on.
    detector: Option<ChangeDetector>,
}

impl Live {
    /// Grab the source and crop the region. Follows source resizes by
    /// re-clamping the region, which restarts detection if the region moved.
    fn sample(
        &mut self,
        clock: &dyn Clock,
        seq: u64,
    ) -> Result<(Frame, DateTime<Local>), SourceError> {
        let image = self.source.grab()?;
        let at = clock.now();

        if image.dimensions() != (self.width, self.height) {
            let (width, height) = image.dimensions();
            warn!(
                from = ?(self.width, self.height),
                to = ?(width, height),
                "source resized"
            );
            self.width = width;
            self.height = height;
            let region = self.region.clamp_to(width, height);
            if region != self.region {
                self.region = region;
                if let Some(detector) = &mut self.detector {
                    detector.reset();
                }
            }
        }

        Ok((
            Frame::from_source(&image, &self.region, at.timestamp_millis(), seq),
            at,
        ))
    }
}

/// The capture session: which source is open, which region is cropped, and
/// whether auto-capture is watching it.
pub struct CaptureSession {
    state: SessionState,
    provider: Box<dyn SourceProvider>,
    sink: Box<dyn FrameSink>,
    clock: Box<dyn Clock>,
    source_config: SourceConfig,
    detector_config: DetectorConfig,
    /// Last region asked for; applied (clamped) on every start.
    requested_region: Option<CaptureRegion>,
    sources: Vec<SourceInfo>,
    selected: Option<String>,
    seq: u64,
}

impl CaptureSession {
    pub fn new(
        provider: Box<dyn SourceProvider>,
        sink: Box<dyn FrameSink>,
        clock: Box<dyn Clock>,
        source_config: SourceConfig,
        requested_region: Option<CaptureRegion>,
        detector_config: DetectorConfig,
    ) -> Self {
        Self {
            state: SessionState::Stopped,
            provider,
            sink,
            clock,
            selected: source_config.id.clone(),
            source_config,
            detector_config,
            requested_region,
            sources: Vec::new(),
            seq: 0,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, SessionState::Live(_))
    }

    /// Whether the poll timer should be running.
    pub fn is_polling(&self) -> bool {
        matches!(&self.state, SessionState::Live(live) if live.detector.is_some())
    }

    pub fn sources(&self) -> &[SourceInfo] {
        &self.sources
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn region(&self) -> Option<CaptureRegion> {
        match &self.state {
            SessionState::Live(live) => Some(live.region),
            SessionState::Stopped => None,
        }
    }

    pub fn detector(&self) -> Option<&ChangeDetector> {
        match &self.state {
            SessionState::Live(live) => live.detector.as_ref(),
            SessionState::Stopped => None,
        }
    }

    pub fn detector_config(&self) -> &DetectorConfig {
        &self.detector_config
    }

    /// Apply one control command. `Quit` is handled by the poll loop.
    pub fn apply(&mut self, command: Command) -> Result<(), SessionError> {
        match command {
            Command::Sources => self.refresh_sources().map(|_| ()),
            Command::Select(id) => self.select(&id),
            Command::Start => self.start(),
            Command::Stop => self.stop(),
            Command::Auto(on) => self.set_auto(on),
            Command::Snap => self.capture_now().map(|_| ()),
            Command::Region(region) => {
                self.set_region(region);
                Ok(())
            }
            Command::Thresholds(config) => self.set_thresholds(config),
            Command::Status => {
                self.log_status();
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }

    /// Re-enumerate sources and re-pick the configured one.
    pub fn refresh_sources(&mut self) -> Result<&[SourceInfo], SessionError> {
        if self.is_live() {
            return Err(SessionError::AlreadyLive);
        }
        let kind = self
            .source_config
            .id
            .as_deref()
            .and_then(parse_id)
            .map(|(kind, _)| kind)
            .unwrap_or(self.source_config.kind);

        self.sources = self.provider.list(kind)?;
        for source in &self.sources {
            info!(
                id = source.id,
                name = source.name,
                width = source.width,
                height = source.height,
                "source"
            );
        }

        self.selected = resolve(&self.source_config, &self.sources).map(|s| s.id.clone());
        match &self.selected {
            Some(id) => info!(id, count = self.sources.len(), "source selected"),
            None => warn!(count = self.sources.len(), "no source matches the configuration"),
        }
        Ok(&self.sources)
    }

    pub fn select(&mut self, id: &str) -> Result<(), SessionError> {
        if self.is_live() {
            return Err(SessionError::AlreadyLive);
        }
        if parse_id(id).is_none() {
            return Err(SourceError::NotFound(id.to_string()).into());
        }
        let name = self
            .sources
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        info!(id, name, "source selected");
        self.selected = Some(id.to_string());
        Ok(())
    }

    /// Open the selected source, listing sources first if nothing is selected.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.is_live() {
            return Err(SessionError::AlreadyLive);
        }
        if self.selected.is_none() {
            self.refresh_sources()?;
        }
        let id = self.selected.clone().ok_or(SessionError::NoSourceSelected)?;

        let source = self.provider.open(&id)?;
        let info = source.info().clone();
        let region = match self.requested_region {
            Some(r) => r.clamp_to(info.width, info.height),
            None => CaptureRegion::full(info.width, info.height),
        };

        info!(
            id = info.id,
            name = info.name,
            width = info.width,
            height = info.height,
            "capture started"
        );
        log_region(&region);

        self.state = SessionState::Live(Live {
            source,
            width: info.width,
            height: info.height,
            region,
            detector: None,
        });
        Ok(())
    }

    /// Release the source and drop any auto-capture state.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        match std::mem::replace(&mut self.state, SessionState::Stopped) {
            SessionState::Live(live) => {
                warn!(
                    id = live.source.info().id,
                    auto = live.detector.is_some(),
                    "capture stopped"
                );
                Ok(())
            }
            SessionState::Stopped => Err(SessionError::NotLive),
        }
    }

    pub fn set_auto(&mut self, on: bool) -> Result<(), SessionError> {
        let SessionState::Live(live) = &mut self.state else {
            return Err(SessionError::NotLive);
        };
        match (on, live.detector.is_some()) {
            (true, false) => {
                live.detector = Some(ChangeDetector::new(self.detector_config));
                info!(
                    stability_threshold_pct = self.detector_config.stability_threshold_pct,
                    stability_count = self.detector_config.stability_count,
                    novelty_threshold_pct = self.detector_config.novelty_threshold_pct,
                    "auto capture started"
                );
            }
            (false, true) => {
                live.detector = None;
                warn!("auto capture stopped");
            }
            _ => debug!(on, "auto capture unchanged"),
        }
        Ok(())
    }

    /// Change the crop rectangle. While live it is clamped to the source and a
    /// real change restarts detection; it is also kept for the next start.
    pub fn set_region(&mut self, region: CaptureRegion) {
        self.requested_region = Some(region);
        let SessionState::Live(live) = &mut self.state else {
            debug!(?region, "region stored for next start");
            return;
        };

        let clamped = region.clamp_to(live.width, live.height);
        if clamped != region {
            warn!(requested = ?region, clamped = ?clamped, "region clamped to source");
        }
        if clamped != live.region {
            live.region = clamped;
            if let Some(detector) = &mut live.detector {
                detector.reset();
            }
            log_region(&clamped);
        }
    }

    /// Replace the detector thresholds; refused while auto-capture runs.
    pub fn set_thresholds(&mut self, config: DetectorConfig) -> Result<(), SessionError> {
        if self.is_polling() {
            return Err(SessionError::AutoCaptureActive);
        }
        self.detector_config = config.clamped();
        info!(
            stability_threshold_pct = self.detector_config.stability_threshold_pct,
            stability_count = self.detector_config.stability_count,
            novelty_threshold_pct = self.detector_config.novelty_threshold_pct,
            "thresholds updated"
        );
        Ok(())
    }

    /// Save the current region immediately, bypassing the detector.
    pub fn capture_now(&mut self) -> Result<PathBuf, SessionError> {
        let SessionState::Live(live) = &mut self.state else {
            return Err(SessionError::NotLive);
        };
        self.seq += 1;
        let (frame, at) = live.sample(self.clock.as_ref(), self.seq)?;
        Ok(self.sink.save(&frame, &at)?)
    }

    /// One poll tick. Returns the saved path when the detector captured.
    pub fn tick(&mut self) -> Result<Option<PathBuf>, SessionError> {
        let SessionState::Live(live) = &mut self.state else {
            return Ok(None);
        };
        if live.detector.is_none() {
            return Ok(None);
        }

        self.seq += 1;
        let (frame, at) = live.sample(self.clock.as_ref(), self.seq)?;
        let Some(detector) = live.detector.as_mut() else {
            return Ok(None);
        };
        match detector.observe(frame) {
            Some(frame) => Ok(Some(self.sink.save(&frame, &at)?)),
            None => Ok(None),
        }
    }

    fn log_status(&self) {
        match &self.state {
            SessionState::Stopped => info!(
                selected = self.selected.as_deref(),
                sources = self.sources.len(),
                "stopped"
            ),
            SessionState::Live(live) => {
                let thresholds = live.detector.as_ref().map(|d| d.config());
                let detector = live.detector.as_ref().map(|d| d.state());
                info!(
                    id = live.source.info().id,
                    width = live.width,
                    height = live.height,
                    region = ?live.region,
                    auto = detector.is_some(),
                    stable_count = detector.map(|s| s.stable_count),
                    has_baseline = detector.map(|s| s.baseline.is_some()),
                    stability_threshold_pct = thresholds.map(|c| c.stability_threshold_pct),
                    novelty_threshold_pct = thresholds.map(|c| c.novelty_threshold_pct),
                    polls = self.seq,
                    "live"
                );
            }
        }
    }
}

fn log_region(region: &CaptureRegion) {
    info!(
        x = region.x,
        y = region.y,
        width = region.width,
        height = region.height,
        aspect = format!("{:.2}:1", region.aspect_ratio()),
        "capture region"
    );
}
