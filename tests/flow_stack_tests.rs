use guide_engine::orchestrator::flow_stack::{FlowFrame, FlowStack};

fn frame(flow_id: i64) -> FlowFrame {
    FlowFrame {
        flow_id,
        origin: None,
    }
}

fn stack_of(ids: &[i64]) -> FlowStack {
    let mut stack = FlowStack::new();
    for id in ids {
        stack.push(frame(*id));
    }
    stack
}

#[test]
fn push_and_pop_are_lifo() {
    let mut stack = stack_of(&[1, 2, 3]);
    assert_eq!(stack.top().map(|f| f.flow_id), Some(3));
    assert_eq!(stack.root().map(|f| f.flow_id), Some(1));
    assert_eq!(stack.pop().map(|f| f.flow_id), Some(3));
    assert_eq!(stack.flow_ids(), vec![1, 2]);
}

#[test]
fn cursor_walks_down_without_changing_stack() {
    let mut stack = stack_of(&[1, 2, 3]);
    assert_eq!(stack.current().map(|f| f.flow_id), Some(3));
    assert_eq!(stack.look_at_parent().map(|f| f.flow_id), Some(2));
    assert_eq!(stack.look_at_parent().map(|f| f.flow_id), Some(1));
    assert!(stack.look_at_parent().is_none());
    assert!(stack.look_at_parent().is_none());
    assert_eq!(stack.len(), 3);

    stack.reset_lookup();
    assert_eq!(stack.current().map(|f| f.flow_id), Some(3));
}

#[test]
fn commit_drops_frames_above_cursor() {
    let mut stack = stack_of(&[1, 2, 3]);
    stack.look_at_parent();
    stack.commit();

    assert_eq!(stack.flow_ids(), vec![1, 2]);
    assert_eq!(stack.index_from_last(), 0);
    assert_eq!(stack.current().map(|f| f.flow_id), Some(2));
}

#[test]
fn commit_at_top_is_noop() {
    let mut stack = stack_of(&[1, 2]);
    stack.commit();
    assert_eq!(stack.flow_ids(), vec![1, 2]);
}

#[test]
fn push_resets_cursor() {
    let mut stack = stack_of(&[1, 2]);
    stack.look_at_parent();
    stack.push(frame(4));
    assert_eq!(stack.index_from_last(), 0);
    assert_eq!(stack.current().map(|f| f.flow_id), Some(4));
    assert!(stack.contains(1));
    assert!(!stack.contains(3));
}

#[test]
fn empty_stack_has_no_current() {
    let mut stack = FlowStack::new();
    assert!(stack.is_empty());
    assert!(stack.current().is_none());
    assert!(stack.look_at_parent().is_none());
    stack.clear();
    assert!(stack.pop().is_none());
}
