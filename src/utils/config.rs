//! Crate-wide default constants.

/// Default grouping threshold for structured-document export, as a fraction
/// of total root duration.
pub const DEFAULT_DOCUMENT_GROUP_MIN_PERCENT: f64 = 0.01;

/// Default grouping threshold for indented-text export.
pub const DEFAULT_TEXT_GROUP_MIN_PERCENT: f64 = 0.1;

/// Default grouping threshold for flamegraph export.
pub const DEFAULT_FLAMEGRAPH_GROUP_MIN_PERCENT: f64 = 0.01;

/// Default number of trivial open/close cycles used by [`crate::Tracker::new`]
/// to estimate the per-action instrumentation overhead.
pub const DEFAULT_CALIBRATION_ITERATIONS: u32 = 100_000;
