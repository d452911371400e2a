//! Error types for the rendering surface.
//!
//! Invariant violations (nesting misuse, double activation, merging nodes
//! from different groups) are programmer errors and fail fast with panics.
//! Only the flamegraph exporter has a recoverable error surface, since it is
//! the one place arbitrary payload data can make serialization impossible.

use thiserror::Error;

/// Errors that can occur during flamegraph generation
#[derive(Error, Debug)]
pub enum FlamegraphError {
    #[error("circular reference in recorded arguments or results")]
    CircularReference,

    #[error("failed to serialize flamegraph payload: {0}")]
    Serialization(#[from] serde_json::Error),
}
