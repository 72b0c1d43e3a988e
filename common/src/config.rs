use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::frame::CaptureRegion;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub region: Option<RegionConfig>,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Window,
    Monitor,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Window => "window",
            SourceKind::Monitor => "monitor",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    /// Opaque source id (`window:<n>` / `monitor:<n>`). Takes precedence over `name`.
    #[serde(default)]
    pub id: Option<String>,
    /// Case-insensitive substring of the window title or monitor name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub autostart: bool,
    #[serde(default)]
    pub auto_capture: bool,
}

/// Requested crop rectangle, in source pixels. Clamped against the live
/// source once its resolution is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RegionConfig {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<RegionConfig> for CaptureRegion {
    fn from(r: RegionConfig) -> Self {
        CaptureRegion::new(r.x, r.y, r.width, r.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DetectorConfig {
    /// A poll whose difference to the previous poll is at or below this
    /// percentage counts as quiet.
    #[serde(default = "default_stability_threshold_pct")]
    pub stability_threshold_pct: f64,
    /// Consecutive quiet polls required before a capture is considered.
    #[serde(default = "default_stability_count")]
    pub stability_count: u32,
    /// Minimum difference, in percent, between a quiet frame and the last
    /// saved frame for the quiet frame to be saved.
    #[serde(default = "default_novelty_threshold_pct")]
    pub novelty_threshold_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            id: None,
            name: None,
            autostart: false,
            auto_capture: false,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            stability_threshold_pct: default_stability_threshold_pct(),
            stability_count: default_stability_count(),
            novelty_threshold_pct: default_novelty_threshold_pct(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub const STABILITY_THRESHOLD_RANGE: (f64, f64) = (0.1, 50.0);
pub const STABILITY_COUNT_RANGE: (u32, u32) = (1, 50);
pub const NOVELTY_THRESHOLD_RANGE: (f64, f64) = (0.0, 100.0);
pub const JPEG_QUALITY_RANGE: (u8, u8) = (1, 100);
pub const INTERVAL_MS_RANGE: (u64, u64) = (50, 10_000);

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.clamped())
    }

    /// Apply the min/max limits of every user-adjustable field.
    pub fn clamped(mut self) -> Self {
        self.detector = self.detector.clamped();
        self.output.jpeg_quality = clamp_logged(
            "output.jpeg_quality",
            self.output.jpeg_quality,
            JPEG_QUALITY_RANGE,
        );
        self.poll.interval_ms =
            clamp_logged("poll.interval_ms", self.poll.interval_ms, INTERVAL_MS_RANGE);
        self
    }
}

impl DetectorConfig {
    pub fn clamped(self) -> Self {
        Self {
            stability_threshold_pct: clamp_logged(
                "detector.stability_threshold_pct",
                self.stability_threshold_pct,
                STABILITY_THRESHOLD_RANGE,
            ),
            stability_count: clamp_logged(
                "detector.stability_count",
                self.stability_count,
                STABILITY_COUNT_RANGE,
            ),
            novelty_threshold_pct: clamp_logged(
                "detector.novelty_threshold_pct",
                self.novelty_threshold_pct,
                NOVELTY_THRESHOLD_RANGE,
            ),
        }
    }
}

fn clamp_logged<T>(field: &str, value: T, (min, max): (T, T)) -> T
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    // NaN compares false both ways and falls through to `min`.
    let clamped = if value > max {
        max
    } else if value >= min {
        value
    } else {
        min
    };
    if clamped != value {
        warn!(field, %value, %clamped, "config value out of range, clamped");
    }
    clamped
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_source_kind() -> SourceKind {
    SourceKind::Window
}
fn default_stability_threshold_pct() -> f64 {
    0.1
}
fn default_stability_count() -> u32 {
    3
}
fn default_novelty_threshold_pct() -> f64 {
    0.5
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./captures")
}
fn default_jpeg_quality() -> u8 {
    92
}
fn default_interval_ms() -> u64 {
    250
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.source.kind, SourceKind::Window);
        assert!(config.region.is_none());
        assert_eq!(config.detector, DetectorConfig::default());
        assert_eq!(config.detector.stability_count, 3);
        assert_eq!(config.output.dir, PathBuf::from("./captures"));
        assert_eq!(config.output.jpeg_quality, 92);
        assert_eq!(config.poll.interval_ms, 250);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn full_file_parses() {
        let config = Config::parse(
            r#"
            [source]
            kind = "monitor"
            name = "HDMI"
            autostart = true
            auto_capture = true

            [region]
            x = 10
            y = 20
            width = 640
            height = 360

            [detector]
            stability_threshold_pct = 2.5
            stability_count = 4
            novelty_threshold_pct = 10.0

            [output]
            dir = "/tmp/shots"
            "#,
        )
        .unwrap();
        assert_eq!(config.source.kind, SourceKind::Monitor);
        assert_eq!(config.source.name.as_deref(), Some("HDMI"));
        assert!(config.source.autostart && config.source.auto_capture);
        assert_eq!(
            config.region,
            Some(RegionConfig {
                x: 10,
                y: 20,
                width: 640,
                height: 360
            })
        );
        assert_eq!(config.detector.stability_threshold_pct, 2.5);
        assert_eq!(config.detector.stability_count, 4);
        assert_eq!(config.detector.novelty_threshold_pct, 10.0);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/shots"));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = Config::parse(
            r#"
            [detector]
            stability_threshold_pct = 0.0
            stability_count = 99
            novelty_threshold_pct = 250.0

            [output]
            jpeg_quality = 0

            [poll]
            interval_ms = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.detector.stability_threshold_pct, 0.1);
        assert_eq!(config.detector.stability_count, 50);
        assert_eq!(config.detector.novelty_threshold_pct, 100.0);
        assert_eq!(config.output.jpeg_quality, 1);
        assert_eq!(config.poll.interval_ms, 50);
    }

    #[test]
    fn nan_clamps_to_min() {
        let d = DetectorConfig {
            stability_threshold_pct: f64::NAN,
            ..DetectorConfig::default()
        }
        .clamped();
        assert_eq!(d.stability_threshold_pct, 0.1);
    }

    #[test]
    fn unknown_source_kind_is_a_parse_error() {
        let err = Config::parse("[source]\nkind = \"tab\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Path::new("/nonexistent/framesnap.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile(..)));
    }
}
