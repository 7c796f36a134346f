//! Shared test utilities for the boundary tile proxy workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A PMTiles v3 archive builder
//! - A vector tile encoder for line, polygon and point features
//! - Solid-colour PNG/JPEG tile generators and pixel comparison helpers
//! - A style configuration fixture
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
//! use test_utils::{PmtilesBuilder, VectorTileBuilder, line_feature};
//! ```

pub mod archive;
pub mod fixtures;
pub mod generators;
pub mod mvt;
pub mod paths;

// Re-export commonly used items at the crate root
pub use archive::*;
pub use fixtures::*;
pub use generators::*;
pub use mvt::*;
pub use paths::*;

/// Macro to skip a test if the required file is not found.
///
/// Used by tests that can also run against a real correction archive when
/// one is available locally.
///
/// # Usage
///
/// ```ignore
/// use test_utils::require_test_file;
///
/// #[test]
/// fn test_real_archive() {
///     let path = require_test_file!("corrections.pmtiles");
///     // Test code using path...
/// }
/// ```
///
/// If the file is not found, the test will print a skip message and return early.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

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
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
