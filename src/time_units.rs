// SPDX-License-Identifier: MPL-2.0
//! Time unit conversion for frame buffering.
//!
//! Presentation times are floating-point seconds; the frame cache indexes
//! entries by a quantized integer key so that near-identical timestamps
//! deduplicate and iteration order equals chronological order.

/// Quantization steps per second for cache keys.
pub const KEY_STEPS_PER_SECOND: f64 = 1024.0;

/// Converts a presentation time in seconds to a quantized cache key.
///
/// # Examples
///
/// ```
/// use framewell::time_units::pts_to_key;
///
/// assert_eq!(pts_to_key(0.0), 0);
/// assert_eq!(pts_to_key(1.0), 1024);
/// assert_eq!(pts_to_key(0.5), 512);
/// ```
#[inline]
#[allow(clippy::cast_possible_truncation)] // pts in seconds stays far below i64 range
pub fn pts_to_key(pts_secs: f64) -> i64 {
    (pts_secs * KEY_STEPS_PER_SECOND).round() as i64
}

/// Converts a quantized cache key back to seconds.
///
/// # Examples
///
/// ```
/// use framewell::time_units::key_to_pts;
///
/// assert_eq!(key_to_pts(1024), 1.0);
/// assert_eq!(key_to_pts(512), 0.5);
/// ```
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn key_to_pts(key: i64) -> f64 {
    key as f64 / KEY_STEPS_PER_SECOND
}
