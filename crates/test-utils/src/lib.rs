//! Shared test utilities for the sky-tiles workspace.
//!
//! - [`FitsFixture`]: in-memory FITS streams with celestial WCS headers
//! - generators: star fields, gradients, outliers and blank pixels
//! - scratch cache directories and directory listings
//!
//! Well-known sky positions and survey names live in [`positions`] and
//! [`surveys`].

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Assert that two angles or values agree within `tolerance`.
///
/// ```ignore
/// assert_approx_eq!(202.4701, 202.47, 0.001);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected, tolerance) = ($actual as f64, $expected as f64, $tolerance as f64);
        let delta = (actual - expected).abs();
        assert!(
            delta <= tolerance,
            "assertion failed: |{} - {}| = {} exceeds {}",
            actual,
            expected,
            delta,
            tolerance
        );
    }};
}

/// Approximate equality of (longitude, latitude) pairs.
#[macro_export]
macro_rules! assert_sky_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected) = ($actual, $expected);
        $crate::assert_approx_eq!(actual.0, expected.0, $tolerance);
        $crate::assert_approx_eq!(actual.1, expected.1, $tolerance);
    }};
}
