//! Action nodes: one recorded span or instantaneous event.

use crate::value::{CallArgs, Value};

/// Reserved group name of the root node. User-supplied names must differ.
pub(crate) const ROOT_GROUP: &str = "@root";

/// Timestamp sentinel marking an instantaneous event. Events report a zero
/// duration by construction since `start == end`.
pub(crate) const EVENT_SENTINEL_MS: f64 = -1.0;

/// Handle to an action node inside its tracker's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

/// One recorded span: a named action with timing, payload, and child spans.
///
/// Timestamps are milliseconds relative to the owning tracker's epoch.
/// `start == None` means the node was created but never opened.
#[derive(Debug)]
pub(crate) struct ActionNode {
    pub group: String,
    pub parent: Option<NodeId>,
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub args: CallArgs,
    pub result: Value,
    pub children: Vec<NodeId>,
}

impl ActionNode {
    pub fn new(parent: Option<NodeId>, group: String, args: CallArgs) -> Self {
        Self {
            group,
            parent,
            start: None,
            end: None,
            args,
            result: Value::Unit,
            children: Vec::new(),
        }
    }

    /// Duration in milliseconds. Zero until the node is closed, and exactly
    /// zero for events.
    pub fn length_ms(&self) -> f64 {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end - start,
            _ => 0.0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }

    pub fn is_event(&self) -> bool {
        self.start == Some(EVENT_SENTINEL_MS)
    }
}
