// SPDX-License-Identifier: MPL-2.0
//! Shared helpers for unit tests.

pub use approx::assert_abs_diff_eq;

/// Tolerance for times derived from frame indices.
#[allow(dead_code)]
pub const TIME_EPSILON: f64 = 1e-9;
