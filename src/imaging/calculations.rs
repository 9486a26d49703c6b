//! Pure calculation functions for page dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::params::ResizeDecision;

/// Decide whether a page of the given height must be downscaled.
///
/// Pages taller than `max_height` are scaled to exactly `max_height`; all
/// others keep their dimensions. Width is never considered here.
///
/// # Examples
/// ```
/// # use comic_shrink::imaging::{ResizeDecision, decide_resize};
/// assert_eq!(decide_resize(3000, 1440), ResizeDecision::Resize { target_height: 1440 });
/// assert_eq!(decide_resize(1440, 1440), ResizeDecision::Unchanged);
/// ```
pub fn decide_resize(height: u32, max_height: u32) -> ResizeDecision {
    if height > max_height {
        ResizeDecision::Resize {
            target_height: max_height,
        }
    } else {
        ResizeDecision::Unchanged
    }
}

/// Width that keeps the aspect ratio when scaling `height` to `target_height`.
///
/// Rounded to the nearest pixel, never less than 1.
pub fn scaled_width(width: u32, height: u32, target_height: u32) -> u32 {
    if height == 0 {
        return width.max(1);
    }
    let w = (width as f64 * target_height as f64 / height as f64).round() as u32;
    w.max(1)
}
