//! Grouping/render engine.
//!
//! Raw traces can contain thousands of near-zero-cost repeated calls;
//! rendering every one is unreadable. `RenderNode::build` compresses
//! consecutive same-named low-weight siblings into one representative node
//! while preserving aggregate call counts and a scaled duration.

use std::collections::BTreeMap;

use log::debug;

use crate::tracker::{ActionNode, NodeId};

/// A display-ready, possibly-merged aggregation of one or more same-named
/// action nodes.
#[derive(Debug)]
pub struct RenderNode {
    pub(crate) group: String,
    pub(crate) args_display: String,
    pub(crate) result_display: String,
    pub(crate) length: f64,
    pub(crate) calls: BTreeMap<String, u64>,
    pub(crate) children: Vec<RenderNode>,
    pub(crate) group_size: u64,
    pub(crate) use_calls_as_value: bool,
    pub(crate) avg_action_time: f64,
}

impl RenderNode {
    /// Builds the render tree for `id` bottom-up, grouping children whose
    /// duration does not exceed `group_min_time` (milliseconds).
    ///
    /// Grouping is bypassed entirely in calls-as-value mode and when the
    /// threshold is zero: both produce a tree isomorphic to the raw one.
    pub(crate) fn build(
        nodes: &[ActionNode],
        id: NodeId,
        group_min_time: f64,
        use_calls_as_value: bool,
        avg_action_time: f64,
    ) -> RenderNode {
        let action = &nodes[id.0];

        let built: Vec<RenderNode> = action
            .children
            .iter()
            .map(|&child| {
                Self::build(
                    nodes,
                    child,
                    group_min_time,
                    use_calls_as_value,
                    avg_action_time,
                )
            })
            .collect();

        let mut calls: BTreeMap<String, u64> = BTreeMap::new();
        calls.insert(action.group.clone(), 1);

        let raw_count = built.len();
        let mut grouped: Vec<RenderNode> = Vec::with_capacity(raw_count);
        let mut buffer: Option<RenderNode> = None;

        for child in built {
            for (name, count) in &child.calls {
                *calls.entry(name.clone()).or_insert(0) += count;
            }

            if use_calls_as_value || group_min_time == 0.0 {
                grouped.push(child);
            } else if child.length > group_min_time {
                // A heavy child is never merged; it flushes whatever was
                // pending so ordering is preserved.
                if let Some(pending) = buffer.take() {
                    grouped.push(pending);
                }
                grouped.push(child);
            } else if buffer
                .as_ref()
                .is_some_and(|pending| pending.group == child.group)
            {
                let mut pending = buffer.take().expect("buffer checked above");
                pending.group_with(child);
                if pending.length > group_min_time {
                    grouped.push(pending);
                } else {
                    buffer = Some(pending);
                }
            } else {
                if let Some(pending) = buffer.take() {
                    grouped.push(pending);
                }
                buffer = Some(child);
            }
        }

        if let Some(pending) = buffer {
            grouped.push(pending);
        }

        if grouped.len() != raw_count {
            debug!(
                "grouped {} children of '{}' into {}",
                raw_count,
                action.group,
                grouped.len()
            );
        }

        RenderNode {
            group: action.group.clone(),
            args_display: action.args.format(),
            result_display: action.result.repr(),
            length: action.length_ms(),
            calls,
            children: grouped,
            group_size: 1,
            use_calls_as_value,
            avg_action_time,
        }
    }

    /// Absorbs `other` into this node: call multisets are summed and the
    /// duration is rescaled as if this node now stood for one more
    /// occurrence of uniform weight. Both nodes must share a group name;
    /// merging unrelated spans is a logic bug in the grouping sweep and
    /// panics.
    fn group_with(&mut self, other: RenderNode) {
        assert_eq!(
            self.group, other.group,
            "cannot merge render nodes from different groups"
        );
        for (name, count) in &other.calls {
            *self.calls.entry(name.clone()).or_insert(0) += count;
        }
        if self.length > 0.0 {
            self.scale(1.0 + other.length / self.length, 1);
        } else {
            // A zero-length buffer absorbs the other duration directly.
            self.length = other.length;
            self.scale(1.0, 1);
        }
    }

    /// Multiplies the duration and bumps the merge multiplicity, recursing
    /// with the NEW multiplicity as the child increment: children of a
    /// merged node are assumed to occur proportionally more often too. This
    /// is an approximation of the true per-descendant occurrence count, kept
    /// for display purposes.
    fn scale(&mut self, length_factor: f64, group_add: u64) {
        self.length *= length_factor;
        self.group_size += group_add;
        for child in &mut self.children {
            child.scale(length_factor, self.group_size);
        }
    }

    /// Confidence in `0..=1` that the reported duration is distinguishable
    /// from pure instrumentation overhead. Values below 0.5 are flagged in
    /// the flamegraph viewer. Always `1.0` when calibration was skipped.
    pub fn representative(&self) -> f64 {
        if self.avg_action_time == 0.0 {
            return 1.0;
        }
        (self.length / self.avg_action_time / self.group_size as f64 / 10.0).min(1.0)
    }

    /// Display name: the raw group plus formatted call arguments and result
    /// for a single node, or `group xN` for a merged one.
    pub fn display_name(&self) -> String {
        if self.group_size == 1 {
            format!(
                "{}{} -> {}",
                self.group, self.args_display, self.result_display
            )
        } else {
            format!("{} x{}", self.group, self.group_size)
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Aggregated duration in milliseconds.
    pub fn length_ms(&self) -> f64 {
        self.length
    }

    /// Occurrences of each group name in this subtree, merged-away originals
    /// included.
    pub fn calls(&self) -> &BTreeMap<String, u64> {
        &self.calls
    }

    /// Total number of recorded nodes in this subtree.
    pub fn call_total(&self) -> u64 {
        self.calls.values().sum()
    }

    pub fn children(&self) -> &[RenderNode] {
        &self.children
    }

    /// How many original nodes were merged into this one.
    pub fn group_size(&self) -> u64 {
        self.group_size
    }

    pub fn uses_calls_as_value(&self) -> bool {
        self.use_calls_as_value
    }
}
