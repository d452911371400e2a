//! Tracking tree: session lifecycle and the scope state machine.
//!
//! A [`Tracker`] owns every action node recorded during one traced session in
//! an index arena, plus the cursor pointing at the innermost open scope.
//! Nesting is enforced structurally: opening a scope asserts the cursor is at
//! its parent, closing asserts the cursor is at the scope itself. Violations
//! are programmer errors and panic immediately rather than producing a
//! structurally wrong trace.

mod node;

pub use node::NodeId;
pub(crate) use node::ActionNode;
use node::{EVENT_SENTINEL_MS, ROOT_GROUP};

use std::cell::RefCell;
use std::time::Instant;

use log::debug;

use crate::output;
use crate::output::document::Document;
use crate::render::RenderNode;
use crate::utils::config::{
    DEFAULT_CALIBRATION_ITERATIONS, DEFAULT_DOCUMENT_GROUP_MIN_PERCENT,
    DEFAULT_FLAMEGRAPH_GROUP_MIN_PERCENT, DEFAULT_TEXT_GROUP_MIN_PERCENT,
};
use crate::utils::error::FlamegraphError;
use crate::value::{CallArgs, Value};

const ROOT: NodeId = NodeId(0);

struct TreeState {
    nodes: Vec<ActionNode>,
    current: Option<NodeId>,
    activated: bool,
}

/// One traced session: the owning tree of recorded actions.
///
/// Construct, [`activate`](Self::activate) to obtain the session guard, record
/// actions and events through the guard, let the guard finish, then render.
pub struct Tracker {
    state: RefCell<TreeState>,
    epoch: Instant,
    avg_action_time: f64,
}

impl Tracker {
    /// Creates a tracker and calibrates the per-action instrumentation
    /// overhead with [`DEFAULT_CALIBRATION_ITERATIONS`] trivial cycles.
    pub fn new() -> Self {
        Self::with_calibration(DEFAULT_CALIBRATION_ITERATIONS)
    }

    /// Creates a tracker, running `iterations` trivial open/close cycles in a
    /// throwaway tree to estimate the mean overhead of one action. Pass `0`
    /// to skip calibration; representativeness scores then report full
    /// confidence.
    pub fn with_calibration(iterations: u32) -> Self {
        let avg_action_time = if iterations > 0 {
            Self::calibrate(iterations)
        } else {
            0.0
        };

        let root = ActionNode::new(None, ROOT_GROUP.to_string(), CallArgs::new());
        Self {
            state: RefCell::new(TreeState {
                nodes: vec![root],
                current: None,
                activated: false,
            }),
            epoch: Instant::now(),
            avg_action_time,
        }
    }

    /// Measures the mean cost of one trivial open/close cycle, in
    /// milliseconds.
    fn calibrate(iterations: u32) -> f64 {
        let probe = Tracker::with_calibration(0);
        let started = Instant::now();
        {
            let session = probe.activate();
            for _ in 0..iterations {
                let _scope = session.action("calibration");
            }
        }
        let avg = started.elapsed().as_secs_f64() * 1e3 / f64::from(iterations);
        debug!("calibrated avg action time: {avg:.6}ms over {iterations} cycles");
        avg
    }

    fn now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1e3
    }

    /// Mean overhead of one trivial action in milliseconds, or `0.0` when
    /// calibration was skipped.
    pub fn avg_action_time(&self) -> f64 {
        self.avg_action_time
    }

    /// True while some scope (the root included) is open.
    pub fn is_active(&self) -> bool {
        self.state.borrow().current.is_some()
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    /// The innermost open scope, if any.
    pub fn current(&self) -> Option<NodeId> {
        self.state.borrow().current
    }

    /// Starts the session: opens the root scope and returns the guard every
    /// recording call goes through. A tracker can be activated exactly once;
    /// a second activation is a programmer error and panics.
    ///
    /// Dropping the guard without calling [`TrackerGuard::finish`] runs the
    /// non-panicking [`TrackerGuard::try_finish`] path, so the session state
    /// stays consistent across error unwinding.
    pub fn activate(&self) -> TrackerGuard<'_> {
        {
            let mut state = self.state.borrow_mut();
            assert!(!state.activated, "tracker has already been activated");
            state.activated = true;
        }
        self.open(ROOT);
        debug!("tracker activated");
        TrackerGuard {
            tracker: self,
            finished: false,
        }
    }

    fn create(&self, parent: Option<NodeId>, group: String, args: CallArgs) -> NodeId {
        let mut state = self.state.borrow_mut();
        let id = NodeId(state.nodes.len());
        state.nodes.push(ActionNode::new(parent, group, args));
        if let Some(parent) = parent {
            state.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Scope entry: stamps `start` and moves the cursor onto the node.
    fn open(&self, id: NodeId) {
        let now = self.now_ms();
        let mut state = self.state.borrow_mut();
        let parent = state.nodes[id.0].parent;
        assert_eq!(
            state.current, parent,
            "scope opened out of order: the cursor is not at the node's parent"
        );
        assert!(
            state.nodes[id.0].start.is_none(),
            "scope has already been opened"
        );
        state.nodes[id.0].start = Some(now);
        state.current = Some(id);
    }

    /// Scope exit: stamps `end` and restores the cursor to the parent.
    fn close(&self, id: NodeId) {
        let now = self.now_ms();
        let mut state = self.state.borrow_mut();
        assert_eq!(
            state.current,
            Some(id),
            "scope closed out of order: the cursor is not at the node being closed"
        );
        state.nodes[id.0].end = Some(now);
        state.current = state.nodes[id.0].parent;
    }

    fn deactivate(&self) {
        self.close(ROOT);
        debug!("tracker deactivated");
    }

    /// Non-panicking deactivation used on unwinding paths. Closes the root
    /// and reports `true` only when the cursor is already back at the root;
    /// otherwise some deeper scope is still open and the root is left as-is.
    fn try_deactivate(&self) -> bool {
        let at_root = self.state.borrow().current == Some(ROOT);
        if at_root {
            self.close(ROOT);
            debug!("tracker deactivated");
        }
        at_root
    }

    fn new_action(&self, name: &str, args: CallArgs) -> NodeId {
        assert_ne!(name, ROOT_GROUP, "the root group name is reserved");
        let parent = {
            let state = self.state.borrow();
            assert!(
                state.nodes[ROOT.0].start.is_some(),
                "tracker has not been activated"
            );
            state.current
        };
        self.create(parent, name.to_string(), args)
    }

    /// Records a pre-closed, zero-duration event parented at the cursor.
    /// Events never become current, so the cursor is untouched.
    fn new_event(&self, name: &str, args: CallArgs, result: Value) -> NodeId {
        let id = self.new_action(name, args);
        let mut state = self.state.borrow_mut();
        let node = &mut state.nodes[id.0];
        node.start = Some(EVENT_SENTINEL_MS);
        node.end = Some(EVENT_SENTINEL_MS);
        node.result = result;
        id
    }

    fn set_result(&self, id: NodeId, result: Value) {
        self.state.borrow_mut().nodes[id.0].result = result;
    }

    pub fn group_of(&self, id: NodeId) -> String {
        self.state.borrow().nodes[id.0].group.clone()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.state.borrow().nodes[id.0].parent
    }

    pub fn children_of(&self, id: NodeId) -> Vec<NodeId> {
        self.state.borrow().nodes[id.0].children.clone()
    }

    pub fn length_ms_of(&self, id: NodeId) -> f64 {
        self.state.borrow().nodes[id.0].length_ms()
    }

    pub fn result_of(&self, id: NodeId) -> Value {
        self.state.borrow().nodes[id.0].result.clone()
    }

    pub fn is_event(&self, id: NodeId) -> bool {
        self.state.borrow().nodes[id.0].is_event()
    }

    /// Builds the compressed render tree for this session.
    ///
    /// `group_min_percent` is the grouping threshold as a fraction of total
    /// root duration; `use_calls_as_value` switches node values from
    /// durations to call counts and disables grouping. The session must be
    /// finalized first.
    pub fn to_render(&self, group_min_percent: f64, use_calls_as_value: bool) -> RenderNode {
        let state = self.state.borrow();
        let root = &state.nodes[ROOT.0];
        assert!(root.is_closed(), "rendering requires a finalized tracker");
        let group_min_time = group_min_percent * root.length_ms();
        RenderNode::build(
            &state.nodes,
            ROOT,
            group_min_time,
            use_calls_as_value,
            self.avg_action_time,
        )
    }

    /// Structured-document export.
    pub fn to_document(&self, group_min_percent: f64, use_calls_as_value: bool) -> Document {
        output::document::render_document(&self.to_render(group_min_percent, use_calls_as_value))
    }

    /// [`to_document`](Self::to_document) with the conventional threshold
    /// ([`DEFAULT_DOCUMENT_GROUP_MIN_PERCENT`]) and durations as values.
    pub fn to_document_default(&self) -> Document {
        self.to_document(DEFAULT_DOCUMENT_GROUP_MIN_PERCENT, false)
    }

    /// Indented-text export. Text output is built with call counts as the
    /// display value, which also bypasses sibling merging.
    pub fn to_text(&self, group_min_percent: f64, ignore_args: bool) -> String {
        output::text::render_text(&self.to_render(group_min_percent, true), ignore_args)
    }

    /// [`to_text`](Self::to_text) with the conventional threshold
    /// ([`DEFAULT_TEXT_GROUP_MIN_PERCENT`]), arguments included.
    pub fn to_text_default(&self) -> String {
        self.to_text(DEFAULT_TEXT_GROUP_MIN_PERCENT, false)
    }

    /// Self-contained flamegraph HTML export. `split` emits one graph per
    /// root child, each under a synthetic copy of the root.
    ///
    /// # Errors
    /// [`FlamegraphError::CircularReference`] when any recorded argument or
    /// result contains a reference cycle, [`FlamegraphError::Serialization`]
    /// when the JSON payload cannot be built.
    pub fn to_flamegraph(
        &self,
        group_min_percent: f64,
        split: bool,
        use_calls_as_value: bool,
    ) -> Result<String, FlamegraphError> {
        self.ensure_payload_acyclic()?;
        output::flamegraph::render_flamegraph(
            &self.to_render(group_min_percent, use_calls_as_value),
            split,
        )
    }

    /// [`to_flamegraph`](Self::to_flamegraph) with the conventional
    /// threshold ([`DEFAULT_FLAMEGRAPH_GROUP_MIN_PERCENT`]), unsplit, with
    /// durations as values.
    ///
    /// # Errors
    /// Same surface as [`to_flamegraph`](Self::to_flamegraph).
    pub fn to_flamegraph_default(&self) -> Result<String, FlamegraphError> {
        self.to_flamegraph(DEFAULT_FLAMEGRAPH_GROUP_MIN_PERCENT, false, false)
    }

    fn ensure_payload_acyclic(&self) -> Result<(), FlamegraphError> {
        let state = self.state.borrow();
        for node in &state.nodes {
            node.args.ensure_acyclic()?;
            node.result.ensure_acyclic()?;
        }
        Ok(())
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for an activated session. All recording goes through it, and
/// its drop path guarantees the session is released even when the traced
/// code panics.
pub struct TrackerGuard<'t> {
    tracker: &'t Tracker,
    finished: bool,
}

impl<'t> TrackerGuard<'t> {
    pub fn tracker(&self) -> &'t Tracker {
        self.tracker
    }

    /// Opens a new action scope parented at the current cursor. The scope
    /// closes when dropped.
    pub fn action(&self, name: &str) -> ActionScope<'t> {
        self.action_args(name, CallArgs::new())
    }

    /// Like [`action`](Self::action), with recorded call arguments.
    pub fn action_args(&self, name: &str, args: CallArgs) -> ActionScope<'t> {
        let id = self.tracker.new_action(name, args);
        self.tracker.open(id);
        ActionScope {
            tracker: self.tracker,
            id,
        }
    }

    /// Records an instantaneous event at the current cursor.
    pub fn event(&self, name: &str, args: CallArgs, result: impl Into<Value>) -> NodeId {
        self.tracker.new_event(name, args, result.into())
    }

    /// Runs `f` inside an action scope and records its return value as the
    /// scope's result. Panics from `f` propagate unchanged after the scope
    /// is closed.
    pub fn call<F, R>(&self, name: &str, args: CallArgs, f: F) -> R
    where
        F: FnOnce() -> R,
        R: Clone + Into<Value>,
    {
        let scope = self.action_args(name, args);
        let result = f();
        scope.set_result(result.clone());
        result
    }

    /// Ends the session, closing the root scope. Panics if some deeper scope
    /// is still open.
    pub fn finish(mut self) {
        self.finished = true;
        self.tracker.deactivate();
    }

    /// Ends the session without panicking: returns `true` when the root was
    /// closed, `false` when a deeper scope was still open and the root was
    /// left untouched.
    pub fn try_finish(mut self) -> bool {
        self.finished = true;
        self.tracker.try_deactivate()
    }
}

impl Drop for TrackerGuard<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.tracker.try_deactivate() {
            debug!("session guard dropped with open scopes; root left unfinalized");
        }
    }
}

/// RAII guard for one open action scope. Closing happens on drop, on every
/// exit path, so the tracker's cursor is always restored.
pub struct ActionScope<'t> {
    tracker: &'t Tracker,
    id: NodeId,
}

impl ActionScope<'_> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Overwrites the displayed result. Legal at any time before the scope
    /// closes; no timing effect.
    pub fn set_result(&self, result: impl Into<Value>) {
        self.tracker.set_result(self.id, result.into());
    }
}

impl Drop for ActionScope<'_> {
    fn drop(&mut self) {
        self.tracker.close(self.id);
    }
}

/// Runs `f` inside a traced action scope when a session guard is supplied,
/// or calls it unmodified otherwise. This is the explicit opt-in equivalent
/// of an auto-instrumenting wrapper: call sites receive the session handle
/// instead of consulting a global.
pub fn traced<F, R>(session: Option<&TrackerGuard<'_>>, name: &str, args: CallArgs, f: F) -> R
where
    F: FnOnce() -> R,
    R: Clone + Into<Value>,
{
    match session {
        Some(session) => session.call(name, args, f),
        None => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_tracks_open_scopes() {
        let tracker = Tracker::with_calibration(0);
        let session = tracker.activate();
        assert_eq!(tracker.current(), Some(tracker.root()));

        let outer = session.action("outer");
        assert_eq!(tracker.current(), Some(outer.id()));
        {
            let inner = session.action("inner");
            assert_eq!(tracker.current(), Some(inner.id()));
        }
        assert_eq!(tracker.current(), Some(outer.id()));
    }

    #[test]
    #[should_panic(expected = "already been activated")]
    fn test_second_activation_panics() {
        let tracker = Tracker::with_calibration(0);
        {
            let session = tracker.activate();
            session.finish();
        }
        let _ = tracker.activate();
    }

    #[test]
    #[should_panic(expected = "has not been activated")]
    fn test_action_before_activation_panics() {
        let tracker = Tracker::with_calibration(0);
        tracker.new_action("early", CallArgs::new());
    }

    #[test]
    #[should_panic(expected = "root group name is reserved")]
    fn test_root_group_name_is_rejected() {
        let tracker = Tracker::with_calibration(0);
        let session = tracker.activate();
        let _scope = session.action("@root");
    }
}
