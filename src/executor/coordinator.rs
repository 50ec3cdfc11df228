// Normalized → physical coordinate mapping.
use crate::device::DisplayBounds;

/// Maps a normalized coordinate onto `[0, dimension - 1]`.
pub fn norm_to_pixel(norm: f64, dimension: u32) -> i32 {
    if dimension == 0 {
        return 0;
    }
    let max = dimension as i64 - 1;
    let raw = if norm.is_finite() { (norm * dimension as f64) as i64 } else { 0 };
    raw.clamp(0, max) as i32
}

pub fn to_physical(x_norm: f64, y_norm: f64, bounds: DisplayBounds) -> (i32, i32) {
    (
        norm_to_pixel(x_norm, bounds.width),
        norm_to_pixel(y_norm, bounds.height),
    )
}
