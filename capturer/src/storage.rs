use chrono::{DateTime, Local};
use framesnap_common::config::OutputConfig;
use framesnap_common::frame::Frame;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::keys::{capture_file_name, unique_path};

/// Where captured frames go.
pub trait FrameSink {
    /// Persist `frame`, taken at `at`; returns where it ended up.
    fn save(&self, frame: &Frame, at: &DateTime<Local>) -> Result<PathBuf, SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to encode {width}x{height} frame as JPEG: {reason}")]
    Encoding {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("failed to create output directory {0}: {1}")]
    CreateDir(String, std::io::Error),
    #[error("failed to write {0}: {1}")]
    Write(String, std::io::Error),
}

/// Writes each capture as `<dir>/YYYY-MM-DD-HH-mm-ss.jpg`, creating `dir` on
/// demand.
pub struct JpegDirSink {
    dir: PathBuf,
    quality: u8,
}

impl JpegDirSink {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            quality: config.jpeg_quality,
        }
    }

    /// JPEG-encode the RGB channels of `frame`.
    pub fn encode(frame: &Frame, quality: u8) -> Result<Vec<u8>, SinkError> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(SinkError::Encoding {
                width,
                height,
                reason: "empty frame".into(),
            });
        }
        let rgb = RgbImage::from_fn(width, height, |x, y| {
            let p = frame.image.get_pixel(x, y);
            Rgb([p[0], p[1], p[2]])
        });

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality)
            .encode_image(&rgb)
            .map_err(|e| SinkError::Encoding {
                width,
                height,
                reason: e.to_string(),
            })?;
        Ok(jpeg)
    }
}

impl FrameSink for JpegDirSink {
    fn save(&self, frame: &Frame, at: &DateTime<Local>) -> Result<PathBuf, SinkError> {
        let jpeg = Self::encode(frame, self.quality)?;

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| SinkError::CreateDir(self.dir.display().to_string(), e))?;

        let path = unique_path(&self.dir, &capture_file_name(at));
        std::fs::write(&path, &jpeg)
            .map_err(|e| SinkError::Write(path.display().to_string(), e))?;

        debug!(
            path = path.display().to_string(),
            bytes = jpeg.len(),
            seq = frame.seq,
            "wrote capture"
        );
        info!(
            file = path.file_name().map(|n| n.to_string_lossy().into_owned()),
            "captured"
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("framesnap-sink-{tag}-{}", std::process::id()))
    }

    fn frame() -> Frame {
        Frame::new(
            RgbaImage::from_fn(32, 18, |x, y| Rgba([(x * 8) as u8, (y * 14) as u8, 128, 255])),
            0,
            1,
        )
    }

    fn at() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 10, 18, 14, 5, 9)
            .earliest()
            .unwrap()
    }

    #[test]
    fn encode_produces_decodable_jpeg() {
        let jpeg = JpegDirSink::encode(&frame(), 90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 18));
    }

    #[test]
    fn encode_empty_frame_fails() {
        let empty = Frame::new(RgbaImage::new(0, 0), 0, 0);
        assert!(matches!(
            JpegDirSink::encode(&empty, 90),
            Err(SinkError::Encoding { .. })
        ));
    }

    #[test]
    fn save_creates_directory_and_names_by_time() {
        let root = temp_dir("save");
        let _ = std::fs::remove_dir_all(&root);
        let dir = root.join("nested/captures");
        let sink = JpegDirSink::new(&OutputConfig {
            dir: dir.clone(),
            jpeg_quality: 80,
        });

        let path = sink.save(&frame(), &at()).unwrap();
        assert_eq!(path, dir.join("2026-10-18-14-05-09.jpg"));
        assert!(path.is_file());

        // Same second does not overwrite.
        let again = sink.save(&frame(), &at()).unwrap();
        assert_eq!(again, dir.join("2026-10-18-14-05-09-1.jpg"));
        assert!(path.is_file() && again.is_file());

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn save_into_a_file_path_is_an_io_error() {
        let root = temp_dir("blocked");
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        let blocker = root.join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let sink = JpegDirSink::new(&OutputConfig {
            dir: blocker.join("captures"),
            jpeg_quality: 80,
        });
        assert!(matches!(
            sink.save(&frame(), &at()),
            Err(SinkError::CreateDir(..))
        ));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
