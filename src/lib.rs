//! Flametrace
//!
//! In-process execution tracing for hot code paths: record a tree of nested,
//! named actions with their durations during a single session, then render
//! it as an indented summary, a structured document, or an interactive
//! flamegraph, with no external processes, sampling, or OS-level tracing.
//!
//! ## Getting started
//!
//! ```
//! use flametrace::{CallArgs, Tracker};
//!
//! let tracker = Tracker::with_calibration(0);
//! {
//!     let session = tracker.activate();
//!     let scope = session.action_args("load", CallArgs::new().arg("users.db"));
//!     // ... the work being measured ...
//!     scope.set_result("done");
//! }
//! let summary = tracker.to_text(0.1, false);
//! assert!(summary.contains("load"));
//! ```

pub mod output;
pub mod render;
pub mod tracker;
pub mod utils;
pub mod value;

pub use output::document::{Document, DocumentValue};
pub use render::RenderNode;
pub use tracker::{traced, ActionScope, NodeId, Tracker, TrackerGuard};
pub use utils::error::FlamegraphError;
pub use value::{CallArgs, Value};
