//! Window and monitor capture through `xcap`.

use framesnap_common::config::SourceKind;
use image::RgbaImage;
use tracing::debug;
use xcap::{Monitor, Window};

use super::{parse_id, FrameSource, SourceError, SourceInfo, SourceProvider};

pub struct DesktopProvider;

enum Handle {
    Window(Window),
    Monitor(Monitor),
}

pub struct DesktopSource {
    info: SourceInfo,
    handle: Handle,
}

impl SourceProvider for DesktopProvider {
    fn list(&self, kind: SourceKind) -> Result<Vec<SourceInfo>, SourceError> {
        let sources = match kind {
            SourceKind::Window => Window::all()
                .map_err(|e| SourceError::Enumeration(e.to_string()))?
                .iter()
                .filter_map(window_info)
                .collect::<Vec<_>>(),
            SourceKind::Monitor => Monitor::all()
                .map_err(|e| SourceError::Enumeration(e.to_string()))?
                .iter()
                .filter_map(monitor_info)
                .collect::<Vec<_>>(),
        };
        debug!(kind = kind.as_str(), count = sources.len(), "enumerated sources");
        Ok(sources)
    }

    fn open(&self, id: &str) -> Result<Box<dyn FrameSource>, SourceError> {
        let (kind, raw) = parse_id(id).ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        let acquisition = |reason: String| SourceError::Acquisition {
            id: id.to_string(),
            reason,
        };

        let (info, handle) = match kind {
            SourceKind::Window => {
                let window = Window::all()
                    .map_err(|e| acquisition(e.to_string()))?
                    .into_iter()
                    .find(|w| w.id().ok() == Some(raw))
                    .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
                let info = window_info(&window)
                    .ok_or_else(|| acquisition("window is minimized or untitled".into()))?;
                (info, Handle::Window(window))
            }
            SourceKind::Monitor => {
                let monitor = Monitor::all()
                    .map_err(|e| acquisition(e.to_string()))?
                    .into_iter()
                    .find(|m| m.id().ok() == Some(raw))
                    .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
                let info = monitor_info(&monitor)
                    .ok_or_else(|| acquisition("monitor did not report its geometry".into()))?;
                (info, Handle::Monitor(monitor))
            }
        };

        let mut source = DesktopSource { info, handle };
        // Probe once so an unreadable source fails here rather than on every poll.
        let probe = source.grab().map_err(|e| acquisition(e.to_string()))?;
        source.info.width = probe.width();
        source.info.height = probe.height();
        Ok(Box::new(source))
    }
}

impl FrameSource for DesktopSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn grab(&mut self) -> Result<RgbaImage, SourceError> {
        let image = match &self.handle {
            Handle::Window(w) => w.capture_image(),
            Handle::Monitor(m) => m.capture_image(),
        };
        image.map_err(|e| SourceError::Grab(e.to_string()))
    }
}

fn window_info(window: &Window) -> Option<SourceInfo> {
    if window.is_minimized().unwrap_or(false) {
        return None;
    }
    let title = window.title().ok().filter(|t| !t.is_empty())?;
    Some(SourceInfo {
        id: SourceInfo::make_id(SourceKind::Window, window.id().ok()?),
        name: title,
        kind: SourceKind::Window,
        width: window.width().ok()?,
        height: window.height().ok()?,
    })
}

fn monitor_info(monitor: &Monitor) -> Option<SourceInfo> {
    let id = monitor.id().ok()?;
    Some(SourceInfo {
        id: SourceInfo::make_id(SourceKind::Monitor, id),
        name: monitor.name().unwrap_or_else(|_| format!("monitor {id}")),
        kind: SourceKind::Monitor,
        width: monitor.width().ok()?,
        height: monitor.height().ok()?,
    })
}
