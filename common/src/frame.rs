use image::RgbaImage;

/// Pixels kept clear of the right/bottom edge when clamping a region offset.
pub const REGION_EDGE_MARGIN: u32 = 10;

/// A crop rectangle inside a source frame, in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole source.
    pub fn full(source_width: u32, source_height: u32) -> Self {
        Self::new(0, 0, source_width, source_height)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Clamp against a source of the given size.
    ///
    /// Offsets are limited to `[0, max(1, dim - margin)]` and sizes to
    /// `[1, max(2, dim - offset)]`, then the rectangle is intersected with the
    /// source so cropping never reads past its edge. A zero-sized source yields
    /// a zero-sized region.
    pub fn clamp_to(&self, source_width: u32, source_height: u32) -> Self {
        let (x, width) = clamp_axis(self.x, self.width, source_width);
        let (y, height) = clamp_axis(self.y, self.height, source_height);
        Self::new(x, y, width, height)
    }
}

fn clamp_axis(offset: u32, size: u32, dim: u32) -> (u32, u32) {
    if dim == 0 {
        return (0, 0);
    }
    let max_offset = dim.saturating_sub(REGION_EDGE_MARGIN).max(1);
    let offset = offset.min(max_offset).min(dim - 1);
    let max_size = dim.saturating_sub(offset).max(2);
    let size = size.clamp(1, max_size).min(dim - offset);
    (offset, size)
}

/// One sample of the capture region: RGBA pixels plus capture metadata.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl Frame {
    pub fn new(image: RgbaImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            image,
            captured_at_ms,
            seq,
        }
    }

    /// Crop `region` out of a full source image. The region is clamped to the
    /// source first.
    pub fn from_source(
        source: &RgbaImage,
        region: &CaptureRegion,
        captured_at_ms: i64,
        seq: u64,
    ) -> Self {
        let r = region.clamp_to(source.width(), source.height());
        let image = image::imageops::crop_imm(source, r.x, r.y, r.width, r.height).to_image();
        Self::new(image, captured_at_ms, seq)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// Raw RGBA bytes, row-major, 4 bytes per pixel.
    pub fn as_rgba(&self) -> &[u8] {
        self.image.as_raw()
    }
}
