use super::*;
use crate::config::RuntimeConfig;
use crate::registry::CreateOptions;
use crate::runtime::{test_runtime, TestScheduler};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

type Trace = Rc<RefCell<Vec<String>>>;

fn node(runtime: &Runtime, name: &str) -> Node {
    if !runtime.is_registered("item") {
        runtime.register("item", |_| Ok(None)).expect("register");
    }
    runtime
        .create("item", CreateOptions::new().id(name))
        .expect("create")
}

fn trace_updates(node: &Node, trace: &Trace) {
    let sink = trace.clone();
    node.on_update(move |node, _| {
        sink.borrow_mut()
            .push(format!("update {}", node.id().unwrap_or_default()));
        Ok(())
    });
}

fn trace_layout(node: &Node, trace: &Trace) {
    let sink = trace.clone();
    node.on_measure(move |node| {
        sink.borrow_mut()
            .push(format!("measure {}", node.id().unwrap_or_default()));
        Ok(())
    });
    let sink = trace.clone();
    node.on_position(move |node| {
        sink.borrow_mut()
            .push(format!("position {}", node.id().unwrap_or_default()));
        Ok(())
    });
}

fn entries(trace: &Trace) -> Vec<String> {
    trace.borrow().clone()
}

#[test]
fn requests_merge_shallowly() {
    let mut request = UpdateRequest::new().with("a", 1).with("b", 1);
    request.merge(Some(UpdateRequest::new().with("b", 2)));
    assert!(!request.is_all());
    assert_eq!(request.get("a"), Some(&Value::Number(1.0)));
    assert_eq!(request.get("b"), Some(&Value::Number(2.0)));

    request.merge(None);
    assert!(request.is_all());
    assert!(request.wants("anything"));
}

#[test]
fn dirty_set_supports_mutation_during_walk() {
    let (runtime, _) = test_runtime();
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    let c = node(&runtime, "c");

    let mut set = DirtySet::default();
    assert!(set.insert(&a));
    assert!(set.insert(&b));
    assert!(!set.insert(&a));

    assert_eq!(set.next_unvisited(), Some(a.clone()));
    assert!(set.insert(&c));
    assert!(!set.insert(&a));
    assert_eq!(set.next_unvisited(), Some(b.clone()));
    assert_eq!(set.next_unvisited(), Some(c.clone()));
    assert!(!set.has_unvisited());

    set.remove(a.key());
    assert_eq!(set.len(), 2);
    assert!(!set.has_unvisited());
    set.rewind();
    assert_eq!(set.next_unvisited(), Some(b));
    assert_eq!(set.drain_all().len(), 2);
    assert!(set.is_empty());
}

#[test]
fn unbound_nodes_keep_their_request_without_scheduling() {
    let (runtime, scheduler) = test_runtime();
    let n = node(&runtime, "n");
    n.on_update(|_, _| Ok(()));
    n.update_with(UpdateRequest::new().flag("text"));

    assert_eq!(runtime.pending_updates(), 0);
    assert_eq!(scheduler.frames(), 0);
    assert!(n.pending_update().is_some_and(|request| request.wants("text")));
}

#[test]
fn flush_runs_updates_in_insertion_order_then_layout() {
    let (runtime, _) = test_runtime();
    let trace = Trace::default();
    let root = node(&runtime, "root");
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    root.append_child(&a).expect("append");
    root.append_child(&b).expect("append");
    for n in [&a, &b] {
        trace_updates(n, &trace);
        trace_layout(n, &trace);
    }
    runtime.mount(&root).expect("mount");
    runtime.update_all().expect("flush");

    assert_eq!(
        entries(&trace),
        [
            "update a",
            "update b",
            "measure a",
            "measure b",
            "position a",
            "position b"
        ]
    );
    assert_eq!(runtime.pending_updates(), 0);
    assert_eq!(runtime.pending_positions(), 0);
}

#[test]
fn requests_are_consumed_at_update_time() {
    let (runtime, _) = test_runtime();
    let n = node(&runtime, "n");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    n.on_update(move |node, request| {
        sink.borrow_mut().push(request.clone());
        assert!(node.pending_update().is_none());
        Ok(())
    });
    runtime.mount(&n).expect("mount");
    runtime.update_all().expect("first flush");

    n.update_with(UpdateRequest::new().with("text", "a"));
    n.update_with(UpdateRequest::new().with("text", "b").flag("color"));
    runtime.update_all().expect("second flush");

    let seen = seen.borrow();
    assert!(seen[0].is_all());
    assert_eq!(seen[1].get("text"), Some(&Value::from("b")));
    assert!(seen[1].wants("color"));
}

#[test]
fn each_dirty_node_updates_once_per_flush() {
    let (runtime, scheduler) = test_runtime();
    let trace = Trace::default();
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    runtime.mount(&a).expect("mount");
    runtime.mount(&b).expect("mount");
    runtime.update_all().expect("settle");

    trace_updates(&a, &trace);
    let other = a.clone();
    b.on_update(move |_, _| {
        other.update_with(UpdateRequest::new().flag("late"));
        Ok(())
    });

    a.update();
    b.update();
    let frames = scheduler.frames();
    runtime.update_all().expect("flush");
    assert_eq!(entries(&trace), ["update a"]);
    assert!(a.pending_update().is_none());
    assert_eq!(scheduler.frames(), frames);
}

#[test]
fn nodes_dirtied_during_the_update_phase_are_processed_in_the_same_flush() {
    let (runtime, _) = test_runtime();
    let trace = Trace::default();
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    runtime.mount(&a).expect("mount");
    runtime.mount(&b).expect("mount");
    runtime.update_all().expect("settle");

    trace_updates(&a, &trace);
    trace_updates(&b, &trace);
    let other = b.clone();
    a.on_update(move |_, _| {
        other.update();
        Ok(())
    });

    a.update();
    runtime.update_all().expect("flush");
    assert_eq!(entries(&trace), ["update a", "update b"]);
    assert_eq!(runtime.pending_updates(), 0);
}

#[test]
fn requests_made_during_own_update_are_dropped_with_the_flush() {
    let (runtime, scheduler) = test_runtime();
    let n = node(&runtime, "n");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    n.on_update(move |node, request| {
        sink.borrow_mut().push(request.clone());
        if request.get("next").is_none() {
            node.update_with(UpdateRequest::new().flag("again"));
        }
        Ok(())
    });
    runtime.mount(&n).expect("mount");
    runtime.update_all().expect("flush");

    assert_eq!(seen.borrow().len(), 1);
    assert!(n.pending_update().is_none());
    assert!(!runtime.needs_frame());

    n.update_with(UpdateRequest::new().flag("next"));
    assert_eq!(scheduler.frames(), 2);
    runtime.update_all().expect("next flush");
    let seen = seen.borrow();
    assert!(seen[1].wants("next"));
    assert!(seen[1].get("again").is_none());
}

#[test]
fn anchored_nodes_lay_out_after_their_anchor() {
    let (runtime, _) = test_runtime();
    let trace = Trace::default();
    let root = node(&runtime, "root");
    let popup = node(&runtime, "popup");
    let target = node(&runtime, "target");
    let inner = node(&runtime, "inner");
    root.append_child(&popup).expect("append");
    root.append_child(&target).expect("append");
    target.append_child(&inner).expect("append");
    popup.set_anchor(Some(&inner));

    for n in [&root, &popup, &target, &inner] {
        trace_layout(n, &trace);
    }
    runtime.mount(&root).expect("mount");
    runtime.update_all().expect("flush");

    let order = entries(&trace);
    let at = |entry: &str| {
        order
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("missing {entry}"))
    };
    assert!(at("position root") < at("measure target"));
    assert!(at("position target") < at("measure inner"));
    assert!(at("position inner") < at("measure popup"));
    assert_eq!(order.len(), 8);
}

#[test]
fn positioning_cycles_are_rejected() {
    let (runtime, _) = test_runtime();
    let trace = Trace::default();
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    trace_layout(&a, &trace);
    trace_layout(&b, &trace);
    runtime.mount(&a).expect("mount");
    runtime.mount(&b).expect("mount");
    a.set_anchor(Some(&b));
    b.set_anchor(Some(&a));

    let err = runtime.update_all().expect_err("cycle");
    assert!(matches!(err, WidgetError::AssertionViolation { .. }));
    assert_eq!(runtime.pending_positions(), 0);
    assert!(!runtime.is_flushing());
}

#[test]
fn detached_but_bound_nodes_cannot_be_positioned() {
    let (runtime, _) = test_runtime();
    let root = node(&runtime, "root");
    let orphan = node(&runtime, "orphan");
    orphan.on_position(|_| Ok(()));
    runtime.mount(&root).expect("mount");
    runtime.attach(&root, &orphan).expect("attach");
    orphan.detach_from_parent();

    assert!(matches!(
        runtime.update_all(),
        Err(WidgetError::AssertionViolation { .. })
    ));
}

#[test]
fn hook_errors_abort_and_clear_the_flush() {
    let (runtime, _) = test_runtime();
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    let ran = Rc::new(Cell::new(false));
    a.on_update(|_, _| Err(WidgetError::assertion("broken")));
    let flag = ran.clone();
    b.on_update(move |_, _| {
        flag.set(true);
        Ok(())
    });
    runtime.mount(&a).expect("mount");
    runtime.mount(&b).expect("mount");

    assert!(runtime.update_all().is_err());
    assert!(!ran.get());
    assert_eq!(runtime.pending_updates(), 0);
    assert!(b.pending_update().is_none());
    runtime.update_all().expect("empty flush");
}

#[test]
fn ping_pong_updates_settle_in_one_flush() {
    let (runtime, _) = test_runtime();
    let trace = Trace::default();
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    trace_updates(&a, &trace);
    trace_updates(&b, &trace);
    let (to_b, to_a) = (b.clone(), a.clone());
    a.on_update(move |_, _| {
        to_b.update();
        Ok(())
    });
    b.on_update(move |_, _| {
        to_a.update();
        Ok(())
    });
    runtime.mount(&a).expect("mount");
    runtime.mount(&b).expect("mount");

    runtime.update_all().expect("flush");
    assert_eq!(entries(&trace), ["update a", "update b"]);
}

#[test]
fn runaway_update_chains_are_reported() {
    let scheduler = Arc::new(TestScheduler::default());
    let runtime = Runtime::with_config(
        scheduler,
        RuntimeConfig::default().with_max_update_iterations(50),
    );
    let spawner = runtime.handle();
    runtime
        .register("spawner", move |node| {
            let spawner = spawner.clone();
            node.on_update(move |node, _| {
                let Some(runtime) = spawner.upgrade() else {
                    return Ok(());
                };
                let next = runtime.create("spawner", CreateOptions::new())?;
                runtime.attach(node, &next)
            });
            Ok(None)
        })
        .expect("register");
    let root = runtime
        .create("spawner", CreateOptions::new())
        .expect("create");
    runtime.mount(&root).expect("mount");

    assert!(matches!(
        runtime.update_all(),
        Err(WidgetError::AssertionViolation { .. })
    ));
}

#[test]
fn work_from_position_hooks_runs_in_a_later_pass() {
    let (runtime, _) = test_runtime();
    let trace = Trace::default();
    let a = node(&runtime, "a");
    let b = node(&runtime, "b");
    let c = node(&runtime, "c");
    trace_updates(&b, &trace);
    trace_updates(&c, &trace);
    runtime.mount(&c).expect("mount");
    runtime.update_all().expect("settle");
    trace.borrow_mut().clear();

    let (to_b, to_c) = (b.clone(), c.clone());
    a.on_position(move |_| {
        to_b.update_with(UpdateRequest::new().flag("resize"));
        to_c.update_with(UpdateRequest::new().flag("resize"));
        Ok(())
    });
    runtime.mount(&a).expect("mount");
    runtime.mount(&b).expect("mount");
    runtime.update_all().expect("flush");

    assert_eq!(entries(&trace), ["update b", "update c"]);
    assert_eq!(runtime.pending_updates(), 0);
    assert!(b.pending_update().is_none());
}

#[test]
fn pass_limit_drops_leftover_work() {
    let scheduler = Arc::new(TestScheduler::default());
    let runtime = Runtime::with_config(scheduler, RuntimeConfig::default().with_max_flush_passes(2));
    let a = node(&runtime, "a");
    let positions = Rc::new(Cell::new(0));
    let counter = positions.clone();
    a.on_position(move |node| {
        counter.set(counter.get() + 1);
        node.position();
        Ok(())
    });
    runtime.mount(&a).expect("mount");
    runtime.update_all().expect("flush");

    assert_eq!(positions.get(), 2);
    assert_eq!(runtime.pending_positions(), 0);
}

#[test]
fn nested_flush_is_a_no_op() {
    let (runtime, _) = test_runtime();
    let a = node(&runtime, "a");
    let nested = runtime.clone();
    let result = Rc::new(RefCell::new(None));
    let sink = result.clone();
    a.on_update(move |_, _| {
        *sink.borrow_mut() = Some(nested.update_all());
        Ok(())
    });
    runtime.mount(&a).expect("mount");
    runtime.update_all().expect("flush");
    assert_eq!(*result.borrow(), Some(Ok(())));
}

#[test]
fn update_observers_run_after_the_update_until_removed() {
    let (runtime, _) = test_runtime();
    let trace = Trace::default();
    let target = node(&runtime, "target");
    trace_updates(&target, &trace);
    let sink = trace.clone();
    let observer = target.observe_updates(move |node| {
        sink.borrow_mut()
            .push(format!("observed {}", node.id().unwrap_or_default()));
    });
    runtime.mount(&target).expect("mount");
    runtime.update_all().expect("flush");
    assert_eq!(entries(&trace), ["update target", "observed target"]);

    assert!(target.unobserve_updates(observer));
    assert!(!target.unobserve_updates(observer));
    target.update();
    runtime.update_all().expect("flush");
    assert_eq!(entries(&trace).len(), 3);
}
