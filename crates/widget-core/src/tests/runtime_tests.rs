use super::*;
use crate::registry::CreateOptions;
use std::cell::Cell;

fn plain(runtime: &Runtime) -> Node {
    if !runtime.is_registered("plain") {
        runtime.register("plain", |_| Ok(None)).expect("register");
    }
    runtime.create("plain", CreateOptions::new()).expect("create")
}

#[test]
fn ids_are_unique_among_live_nodes() {
    let (runtime, _) = test_runtime();
    let a = plain(&runtime);
    let b = plain(&runtime);

    a.set_id(Some("main")).expect("claim");
    assert_eq!(runtime.node_by_id("main"), Some(a.clone()));
    assert!(matches!(
        b.set_id(Some("main")),
        Err(WidgetError::AssertionViolation { .. })
    ));

    a.set_id(Some("other")).expect("rename");
    assert!(runtime.node_by_id("main").is_none());
    b.set_id(Some("main")).expect("freed id");
    assert_eq!(b.attr("id").as_deref(), Some("main"));
}

#[test]
fn dropped_nodes_leave_the_id_table() {
    let (runtime, _) = test_runtime();
    let node = plain(&runtime);
    node.set_id(Some("gone")).expect("claim");
    drop(node);
    assert!(runtime.node_by_id("gone").is_none());

    let next = plain(&runtime);
    next.set_id(Some("gone")).expect("reuse");
}

#[test]
fn rename_is_announced_to_listeners_of_the_old_id() {
    let (runtime, _) = test_runtime();
    let node = plain(&runtime);
    node.set_id(Some("old")).expect("claim");

    let renamed = Rc::new(RefCell::new(Vec::new()));
    let sink = renamed.clone();
    runtime.listen(Topic::scoped("old", EventKind::IdChanged), move |event| {
        if let Event::IdChanged { id, previous, .. } = event {
            sink.borrow_mut().push((id.clone(), previous.clone()));
        }
    });

    node.set_id(Some("new")).expect("rename");
    assert_eq!(
        renamed.borrow().as_slice(),
        &[(Some("new".to_string()), Some("old".to_string()))]
    );
}

#[test]
fn unlisten_removes_the_listener() {
    let (runtime, _) = test_runtime();
    let hits = Rc::new(Cell::new(0));
    let counter = hits.clone();
    let listener = runtime.listen_all(EventKind::Bind, move |_| counter.set(counter.get() + 1));
    assert_eq!(runtime.listener_count(), 1);

    let node = plain(&runtime);
    node.set_id(Some("n")).expect("claim");
    runtime.mount(&node).expect("mount");
    assert!(runtime.unlisten(listener));
    assert!(!runtime.unlisten(listener));
    runtime.unmount(&node).expect("unmount");

    assert_eq!(hits.get(), 1);
    assert_eq!(runtime.listener_count(), 0);
}

#[test]
fn frame_requests_collapse_until_flushed() {
    let (runtime, scheduler) = test_runtime();
    let node = plain(&runtime);
    node.on_update(|_, _| Ok(()));
    runtime.mount(&node).expect("mount");
    node.update();
    node.update();

    assert!(runtime.needs_frame());
    assert_eq!(scheduler.frames(), 1);
    runtime.update_all().expect("flush");
    assert!(!runtime.needs_frame());

    node.update();
    assert_eq!(scheduler.frames(), 2);
}

#[test]
fn attach_and_detach_follow_the_parent() {
    let (runtime, _) = test_runtime();
    let root = plain(&runtime);
    let child = plain(&runtime);
    let binds = Rc::new(RefCell::new(Vec::new()));
    let sink = binds.clone();
    child.on_bind(move |_, on| sink.borrow_mut().push(on));

    runtime.mount(&root).expect("mount");
    runtime.attach(&root, &child).expect("attach");
    assert!(child.is_bound());
    runtime.detach(&child).expect("detach");
    assert!(!child.is_bound());
    assert!(child.parent().is_none());

    assert_eq!(binds.borrow().as_slice(), &[true, false]);
}

#[test]
fn runtimes_are_independent() {
    let (first, _) = test_runtime();
    let (second, _) = test_runtime();
    let node = plain(&first);
    node.set_id(Some("shared")).expect("claim");
    assert!(second.node_by_id("shared").is_none());
    assert!(!second.is_registered("plain"));
}

#[test]
fn layout_changes_are_announced_globally_and_by_id() {
    let (runtime, _) = test_runtime();
    let node = plain(&runtime);
    node.set_id(Some("panel")).expect("claim");
    let hits = Rc::new(RefCell::new(Vec::new()));
    let global = hits.clone();
    runtime.listen_all(EventKind::LayoutChanged, move |_| global.borrow_mut().push("global"));
    let scoped = hits.clone();
    runtime.listen(Topic::scoped("panel", EventKind::LayoutChanged), move |event| {
        assert_eq!(event.kind(), EventKind::LayoutChanged);
        scoped.borrow_mut().push("panel");
    });

    node.layout_changed();
    assert_eq!(hits.borrow().as_slice(), &["global", "panel"]);
}
