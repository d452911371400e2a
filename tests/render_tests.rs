use std::thread::sleep;
use std::time::Duration;

use pretty_assertions::assert_eq;

use flametrace::{CallArgs, Tracker};

/// Ten trivial siblings sharing a name, with a sleep padding the root so the
/// grouping threshold dwarfs every individual sibling.
fn ten_sibling_tracker() -> Tracker {
    let tracker = Tracker::with_calibration(0);
    {
        let session = tracker.activate();
        for i in 0..10 {
            let _scope = session.action_args("C", CallArgs::new().arg(i));
        }
        sleep(Duration::from_millis(10));
    }
    tracker
}

#[test]
fn test_low_weight_same_named_siblings_merge() {
    let tracker = ten_sibling_tracker();

    let render = tracker.to_render(0.5, false);
    assert_eq!(render.children().len(), 1);

    let merged = &render.children()[0];
    assert_eq!(merged.group(), "C");
    assert_eq!(merged.group_size(), 10);
    assert_eq!(merged.calls()["C"], 10);
    assert_eq!(merged.display_name(), "C x10");
}

#[test]
fn test_merge_preserves_total_call_count() {
    let tracker = Tracker::with_calibration(0);
    {
        let session = tracker.activate();
        for _ in 0..5 {
            let _outer = session.action("step");
            let _inner = session.action("detail");
        }
        sleep(Duration::from_millis(10));
    }

    let merged = tracker.to_render(0.5, false);
    let raw = tracker.to_render(0.0, false);

    // root + 5x step + 5x detail on both sides, merges or not.
    assert_eq!(merged.call_total(), raw.call_total());
    assert_eq!(merged.call_total(), 11);
    assert_eq!(merged.calls()["step"], 5);
    assert_eq!(merged.calls()["detail"], 5);
}

#[test]
fn test_zero_threshold_produces_raw_shape() {
    let tracker = ten_sibling_tracker();

    let render = tracker.to_render(0.0, false);
    assert_eq!(render.children().len(), 10);
    for child in render.children() {
        assert_eq!(child.group_size(), 1);
        assert_eq!(child.calls()["C"], 1);
    }
}

#[test]
fn test_calls_as_value_disables_grouping() {
    let tracker = ten_sibling_tracker();

    let render = tracker.to_render(0.5, true);
    assert_eq!(render.children().len(), 10);
    assert!(render.uses_calls_as_value());
    assert_eq!(render.call_total(), 11);
}

#[test]
fn test_heavy_sibling_interrupts_grouping() {
    let tracker = Tracker::with_calibration(0);
    {
        let session = tracker.activate();
        {
            let _light = session.action("task");
        }
        {
            let _heavy = session.action("task");
            sleep(Duration::from_millis(40));
        }
        {
            let _light = session.action("task");
        }
        sleep(Duration::from_millis(10));
    }

    // Threshold sits between the trivial tasks and the 40ms one: the heavy
    // occurrence stays its own node, the light ones around it do not merge
    // across it.
    let render = tracker.to_render(0.2, false);
    assert_eq!(render.children().len(), 3);
    assert!(render.children().iter().all(|c| c.group_size() == 1));
    assert_eq!(render.calls()["task"], 3);
}

#[test]
fn test_nested_groups_fold_into_parent_calls() {
    let tracker = Tracker::with_calibration(0);
    {
        let session = tracker.activate();
        let _outer = session.action("outer");
        for _ in 0..3 {
            let _inner = session.action("inner");
        }
    }

    let render = tracker.to_render(0.0, false);
    assert_eq!(render.calls()["outer"], 1);
    assert_eq!(render.calls()["inner"], 3);
    assert_eq!(render.children()[0].calls()["inner"], 3);
}

#[test]
fn test_representative_stays_in_unit_interval() {
    let tracker = Tracker::with_calibration(1_000);
    {
        let session = tracker.activate();
        {
            let _fast = session.action("fast");
        }
        {
            let _slow = session.action("slow");
            sleep(Duration::from_millis(20));
        }
    }

    let render = tracker.to_render(0.0, false);
    for child in render.children() {
        let score = child.representative();
        assert!((0.0..=1.0).contains(&score), "score out of range: {score}");
    }

    // 20ms of real work towers over per-action overhead.
    let slow = render
        .children()
        .iter()
        .find(|c| c.group() == "slow")
        .unwrap();
    assert_eq!(slow.representative(), 1.0);
}

#[test]
fn test_event_nodes_render_with_zero_length() {
    let tracker = Tracker::with_calibration(0);
    {
        let session = tracker.activate();
        session.event("marker", CallArgs::new(), ());
    }

    let render = tracker.to_render(0.0, false);
    let marker = &render.children()[0];
    assert_eq!(marker.group(), "marker");
    assert_eq!(marker.length_ms(), 0.0);
}
