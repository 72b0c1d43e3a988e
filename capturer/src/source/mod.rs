//! Capturable sources: enumeration, selection and per-poll grabs.
//!
//! The session only sees the [`SourceProvider`] and [`FrameSource`] traits.
//! The live desktop backend is compiled in with the `desktop` feature.

#[cfg(feature = "desktop")]
mod desktop;

use framesnap_common::config::{SourceConfig, SourceKind};
use image::RgbaImage;

/// One entry of the source list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Opaque id, `window:<n>` or `monitor:<n>`.
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    pub width: u32,
    pub height: u32,
}

impl SourceInfo {
    #[cfg_attr(not(feature = "desktop"), allow(dead_code))]
    pub fn make_id(kind: SourceKind, raw: u32) -> String {
        format!("{}:{raw}", kind.as_str())
    }
}

/// Split a source id back into its kind and platform handle.
pub fn parse_id(id: &str) -> Option<(SourceKind, u32)> {
    let (kind, raw) = id.split_once(':')?;
    let kind = match kind {
        "window" => SourceKind::Window,
        "monitor" => SourceKind::Monitor,
        _ => return None,
    };
    Some((kind, raw.parse().ok()?))
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to enumerate capture sources: {0}")]
    Enumeration(String),
    #[error("no capture source matches {0}")]
    NotFound(String),
    #[error("failed to open capture source {id}: {reason}")]
    Acquisition { id: String, reason: String },
    #[error("failed to grab frame: {0}")]
    Grab(String),
    #[error("desktop capture is not available in this build (enable the `desktop` feature)")]
    Unsupported,
}

/// An opened source that yields full-size RGBA images on demand.
pub trait FrameSource {
    fn info(&self) -> &SourceInfo;

    /// Grab the source as it looks right now. The size may change between
    /// grabs (a window being resized).
    fn grab(&mut self) -> Result<RgbaImage, SourceError>;
}

/// Lists and opens sources.
pub trait SourceProvider {
    fn list(&self, kind: SourceKind) -> Result<Vec<SourceInfo>, SourceError>;

    fn open(&self, id: &str) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// Pick the source named by the configuration: an explicit id wins, then the
/// first title containing `name` (case-insensitive), then the first source.
pub fn resolve<'a>(config: &SourceConfig, sources: &'a [SourceInfo]) -> Option<&'a SourceInfo> {
    if let Some(id) = &config.id {
        return sources.iter().find(|s| &s.id == id);
    }
    let mut candidates = sources.iter().filter(|s| s.kind == config.kind);
    match &config.name {
        Some(name) => {
            let needle = name.to_lowercase();
            candidates.find(|s| s.name.to_lowercase().contains(&needle))
        }
        None => candidates.next(),
    }
}

/// The provider for this build: `xcap` windows and monitors with the
/// `desktop` feature, otherwise one that reports [`SourceError::Unsupported`].
#[cfg(feature = "desktop")]
pub fn desktop_provider() -> Box<dyn SourceProvider> {
    Box::new(desktop::DesktopProvider)
}

#[cfg(not(feature = "desktop"))]
pub fn desktop_provider() -> Box<dyn SourceProvider> {
    Box::new(Unavailable)
}

#[cfg(not(feature = "desktop"))]
struct Unavailable;

#[cfg(not(feature = "desktop"))]
impl SourceProvider for Unavailable {
    fn list(&self, _kind: SourceKind) -> Result<Vec<SourceInfo>, SourceError> {
        Err(SourceError::Unsupported)
    }

    fn open(&self, _id: &str) -> Result<Box<dyn FrameSource>, SourceError> {
        Err(SourceError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(kind: SourceKind, raw: u32, name: &str) -> SourceInfo {
        SourceInfo {
            id: SourceInfo::make_id(kind, raw),
            name: name.into(),
            kind,
            width: 800,
            height: 600,
        }
    }

    fn sources() -> Vec<SourceInfo> {
        vec![
            info(SourceKind::Monitor, 1, "DP-1"),
            info(SourceKind::Window, 11, "Terminal"),
            info(SourceKind::Window, 12, "Slides - Mozilla Firefox"),
        ]
    }

    #[test]
    fn id_roundtrip() {
        let id = SourceInfo::make_id(SourceKind::Window, 4242);
        assert_eq!(id, "window:4242");
        assert_eq!(parse_id(&id), Some((SourceKind::Window, 4242)));
        assert_eq!(parse_id("monitor:0"), Some((SourceKind::Monitor, 0)));
        assert_eq!(parse_id("tab:1"), None);
        assert_eq!(parse_id("window:x"), None);
        assert_eq!(parse_id("window"), None);
    }

    #[test]
    fn resolve_defaults_to_first_of_kind() {
        let all = sources();
        let picked = resolve(&SourceConfig::default(), &all).unwrap();
        assert_eq!(picked.id, "window:11");
    }

    #[test]
    fn resolve_by_name_is_case_insensitive() {
        let all = sources();
        let config = SourceConfig {
            name: Some("firefox".into()),
            ..SourceConfig::default()
        };
        assert_eq!(resolve(&config, &all).unwrap().id, "window:12");
    }

    #[test]
    fn resolve_by_id_ignores_kind() {
        let all = sources();
        let config = SourceConfig {
            id: Some("monitor:1".into()),
            name: Some("Terminal".into()),
            ..SourceConfig::default()
        };
        assert_eq!(resolve(&config, &all).unwrap().name, "DP-1");
    }

    #[test]
    fn resolve_unknown_id_is_none() {
        let all = sources();
        let config = SourceConfig {
            id: Some("window:99".into()),
            ..SourceConfig::default()
        };
        assert!(resolve(&config, &all).is_none());
    }

    #[test]
    fn resolve_empty_list_is_none() {
        assert!(resolve(&SourceConfig::default(), &[]).is_none());
    }
}
