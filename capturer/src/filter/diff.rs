use framesnap_common::frame::Frame;

/// Per-channel delta (out of 255) below which a pixel counts as unchanged.
pub const NOISE_TOLERANCE: u8 = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("frames are not comparable: {left:?} vs {right:?}")]
    InvalidInput {
        left: (u32, u32),
        right: (u32, u32),
    },
}

/// Percentage (0..=100) of pixels whose R, G or B channel moved by more than
/// [`NOISE_TOLERANCE`]. Alpha is ignored. An empty frame is 0% different.
pub fn percent_different(a: &Frame, b: &Frame) -> Result<f64, DiffError> {
    if a.dimensions() != b.dimensions() {
        return Err(DiffError::InvalidInput {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }

    let total = a.pixel_count();
    if total == 0 {
        return Ok(0.0);
    }

    let changed = a
        .as_rgba()
        .chunks_exact(4)
        .zip(b.as_rgba().chunks_exact(4))
        .filter(|(p, q)| pixel_changed(p, q))
        .count();

    Ok(changed as f64 / total as f64 * 100.0)
}

#[inline]
fn pixel_changed(p: &[u8], q: &[u8]) -> bool {
    p[..3]
        .iter()
        .zip(&q[..3])
        .any(|(&x, &y)| x.abs_diff(y) > NOISE_TOLERANCE)
}
