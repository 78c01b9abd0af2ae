use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::collections::HashMap;
use crate::config::RuntimeConfig;
use crate::events::{Event, EventKind, ListenerId, Notifier, Topic};
use crate::node::{Node, NodeInner};
use crate::platform::FrameScheduler;
use crate::registry::Registry;
use crate::scheduler::FrameQueue;
use crate::WidgetError;

pub(crate) struct RuntimeInner {
    scheduler: Arc<dyn FrameScheduler>,
    pub(crate) config: RuntimeConfig,
    pub(crate) registry: RefCell<Registry>,
    ids: RefCell<HashMap<String, Weak<NodeInner>>>,
    notifier: Notifier,
    pub(crate) queue: RefCell<FrameQueue>,
    pub(crate) flushing: Cell<bool>,
    frame_requested: Cell<bool>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn FrameScheduler>, config: RuntimeConfig) -> Self {
        Self {
            scheduler,
            config,
            registry: RefCell::new(Registry::default()),
            ids: RefCell::new(HashMap::new()),
            notifier: Notifier::new(),
            queue: RefCell::new(FrameQueue::default()),
            flushing: Cell::new(false),
            frame_requested: Cell::new(false),
        }
    }

    /// Asks the host for one frame; repeated requests before the flush
    /// collapse into the first.
    pub(crate) fn request_frame(&self) {
        if !self.frame_requested.replace(true) {
            self.scheduler.schedule_frame();
        }
    }

    pub(crate) fn clear_frame_request(&self) {
        self.frame_requested.set(false);
    }

    /// Announces `event` to global listeners of its kind, then to listeners
    /// scoped to `scope`.
    pub(crate) fn emit(&self, event: Event, scope: Option<&str>) {
        let kind = event.kind();
        self.notifier.announce(&Topic::global(kind), &event);
        if let Some(scope) = scope {
            self.notifier.announce(&Topic::scoped(scope, kind), &event);
        }
    }

    pub(crate) fn claim_id(&self, id: &str, node: &Node) -> Result<(), WidgetError> {
        let mut ids = self.ids.borrow_mut();
        if let Some(holder) = ids.get(id).and_then(Weak::upgrade) {
            if !Rc::ptr_eq(&holder, &node.inner) {
                return Err(WidgetError::assertion(format!(
                    "id `{id}` already belongs to a live {} node",
                    Node { inner: holder }.kind()
                )));
            }
        }
        ids.insert(id.to_string(), Rc::downgrade(&node.inner));
        log::debug!("registered id `{id}` for {}", node.kind());
        Ok(())
    }

    pub(crate) fn release_id(&self, id: &str, node: &Node) {
        let mut ids = self.ids.borrow_mut();
        let held = ids
            .get(id)
            .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Rc::as_ptr(&node.inner)));
        if held {
            ids.remove(id);
            log::debug!("released id `{id}`");
        }
    }

    // Runs from `NodeInner::drop`, which may happen while the table is
    // borrowed; a stale entry is harmless since lookups upgrade.
    pub(crate) fn forget_dead_id(&self, id: &str) {
        if let Ok(mut ids) = self.ids.try_borrow_mut() {
            if ids.get(id).is_some_and(|weak| weak.strong_count() == 0) {
                ids.remove(id);
            }
        }
    }

    fn node_by_id(&self, id: &str) -> Option<Node> {
        self.ids
            .borrow()
            .get(id)
            .and_then(Weak::upgrade)
            .map(|inner| Node { inner })
    }
}

/// Owner of the registry, id table, notifier and scheduler of one widget
/// tree. Cloning shares the same runtime.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn FrameScheduler>) -> Self {
        Self::with_config(scheduler, RuntimeConfig::default())
    }

    pub fn with_config(scheduler: Arc<dyn FrameScheduler>, config: RuntimeConfig) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler, config)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Live node currently registered under `id`.
    pub fn node_by_id(&self, id: &str) -> Option<Node> {
        self.inner.node_by_id(id)
    }

    pub fn listen(&self, topic: Topic, listener: impl Fn(&Event) + 'static) -> ListenerId {
        self.inner.notifier.listen(topic, Rc::new(listener))
    }

    /// Convenience for a global listener of `kind`.
    pub fn listen_all(&self, kind: EventKind, listener: impl Fn(&Event) + 'static) -> ListenerId {
        self.listen(Topic::global(kind), listener)
    }

    pub fn unlisten(&self, listener: ListenerId) -> bool {
        self.inner.notifier.unlisten(listener)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.notifier.len()
    }

    /// Makes `node` a root of the live tree and binds its subtree.
    pub fn mount(&self, node: &Node) -> Result<(), WidgetError> {
        node.inner.root.set(true);
        node.set_bound(true)
    }

    pub fn unmount(&self, node: &Node) -> Result<(), WidgetError> {
        node.inner.root.set(false);
        node.set_bound(false)
    }

    /// Appends `child` under `parent` and brings its subtree to the parent's
    /// bind state.
    pub fn attach(&self, parent: &Node, child: &Node) -> Result<(), WidgetError> {
        parent.append_child(child)?;
        child.set_bound(parent.is_bound())
    }

    /// Unbinds `child`'s subtree and removes it from its parent.
    pub fn detach(&self, child: &Node) -> Result<(), WidgetError> {
        child.set_bound(false)?;
        child.detach_from_parent();
        Ok(())
    }

    /// Whether a frame was requested and not yet flushed.
    pub fn needs_frame(&self) -> bool {
        self.inner.frame_requested.get()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.get()
    }

    pub fn pending_updates(&self) -> usize {
        self.inner.queue.borrow().updates.len()
    }

    pub fn pending_positions(&self) -> usize {
        self.inner.queue.borrow().positions.len()
    }
}

/// Weak reference to a [`Runtime`], held by every node it creates.
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn upgrade(&self) -> Option<Runtime> {
        self.0.upgrade().map(|inner| Runtime { inner })
    }
}

/// Scheduler for hosts that flush on their own cadence.
#[derive(Default)]
pub struct DefaultScheduler;

impl FrameScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct TestScheduler {
    frames: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub(crate) fn frames(&self) -> usize {
        self.frames.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl FrameScheduler for TestScheduler {
    fn schedule_frame(&self) {
        self.frames
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
pub(crate) fn test_runtime() -> (Runtime, Arc<TestScheduler>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let scheduler = Arc::new(TestScheduler::default());
    (Runtime::new(scheduler.clone()), scheduler)
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
