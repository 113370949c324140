//! Shared test utilities for the plume retrieval workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic band generators
//! - The Hassi Messaoud reference scenario
//! - On-disk scene archive fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{assert_approx_eq, uniform_band, fixtures};
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Assert that every finite cell of a raster is within `epsilon` of `expected`.
///
/// ```ignore
/// assert_all_cells_approx!(signal.raster, 0.44, 1e-5);
/// ```
#[macro_export]
macro_rules! assert_all_cells_approx {
    ($raster:expr, $expected:expr, $epsilon:expr) => {{
        for (i, v) in $raster.data.iter().enumerate() {
            if v.is_finite() {
                let diff = (*v as f64 - $expected as f64).abs();
                if diff > $epsilon as f64 {
                    panic!(
                        "cell {} = {:?}, expected {:?} (diff {:?} > {:?})",
                        i, v, $expected, diff, $epsilon
                    );
                }
            }
        }
    }};
}
