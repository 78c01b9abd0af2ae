//! Deferred update, measure and position scheduling.
//!
//! Mutations only record what is dirty. The host later calls
//! [`Runtime::update_all`] once per frame, which runs every pending
//! `do_update`, then measures and positions nodes so that a positioning
//! parent is always laid out before the nodes that depend on it, and
//! unrelated leaves are measured as one batch before any of them is
//! positioned.

use indexmap::IndexMap;

use crate::collections::FastIndexMap;
use crate::node::{Node, NodeKey};
use crate::runtime::{Runtime, RuntimeInner};
use crate::value::Value;
use crate::WidgetError;

/// Options accumulated for a node between two of its updates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateRequest {
    all: bool,
    options: IndexMap<String, Value>,
}

impl UpdateRequest {
    /// An empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// A request for everything.
    pub fn all() -> Self {
        Self {
            all: true,
            options: IndexMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn flag(self, key: &str) -> Self {
        self.with(key, true)
    }

    pub fn is_all(&self) -> bool {
        self.all
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Whether `key` was requested, either explicitly or through `all`.
    pub fn wants(&self, key: &str) -> bool {
        self.all || self.options.get(key).is_some_and(Value::truthy)
    }

    pub fn options(&self) -> &IndexMap<String, Value> {
        &self.options
    }

    /// Shallow merge; later keys win. `None` requests everything.
    pub fn merge(&mut self, other: Option<UpdateRequest>) {
        match other {
            None => self.all = true,
            Some(other) => {
                self.all |= other.all;
                self.options.extend(other.options);
            }
        }
    }
}

/// Insertion-ordered node set with a cursor. Entries may be appended or
/// removed while it is being walked.
#[derive(Default)]
pub(crate) struct DirtySet {
    entries: FastIndexMap<NodeKey, Node>,
    cursor: usize,
}

impl DirtySet {
    pub(crate) fn insert(&mut self, node: &Node) -> bool {
        if self.entries.contains_key(&node.key()) {
            return false;
        }
        self.entries.insert(node.key(), node.clone());
        true
    }

    pub(crate) fn contains(&self, key: NodeKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub(crate) fn remove(&mut self, key: NodeKey) -> Option<Node> {
        let (index, _, node) = self.entries.shift_remove_full(&key)?;
        if index < self.cursor {
            self.cursor -= 1;
        }
        Some(node)
    }

    pub(crate) fn next_unvisited(&mut self) -> Option<Node> {
        let (_, node) = self.entries.get_index(self.cursor)?;
        self.cursor += 1;
        Some(node.clone())
    }

    pub(crate) fn has_unvisited(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub(crate) fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn drain_all(&mut self) -> Vec<Node> {
        self.cursor = 0;
        self.entries.drain(..).map(|(_, node)| node).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub(crate) struct FrameQueue {
    pub(crate) updates: DirtySet,
    pub(crate) positions: DirtySet,
}

#[derive(Debug, Default)]
struct FlushStats {
    passes: usize,
    updates: usize,
    ancestors: usize,
    leaves: usize,
}

impl RuntimeInner {
    pub(crate) fn schedule_update(&self, node: &Node) {
        let inserted = self.queue.borrow_mut().updates.insert(node);
        // Members already updated in this flush keep only the merged
        // request, which the flush discards when it ends.
        if inserted && !self.flushing.get() {
            self.request_frame();
        }
    }

    pub(crate) fn schedule_position(&self, node: &Node) {
        let inserted = self.queue.borrow_mut().positions.insert(node);
        if inserted && !self.flushing.get() {
            self.request_frame();
        }
    }

    pub(crate) fn cancel(&self, node: &Node) {
        let mut queue = self.queue.borrow_mut();
        queue.updates.remove(node.key());
        queue.positions.remove(node.key());
    }

    fn has_flush_work(&self) -> bool {
        let queue = self.queue.borrow();
        queue.updates.has_unvisited() || !queue.positions.is_empty()
    }
}

struct FlushGuard<'a>(&'a RuntimeInner);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        let dirty = {
            let mut queue = self.0.queue.borrow_mut();
            queue.positions.clear();
            queue.updates.drain_all()
        };
        for node in dirty {
            if let Some(stale) = node.take_pending() {
                log::trace!("dropping request {:?} of {node:?}", stale.options());
            }
        }
        self.0.flushing.set(false);
    }
}

impl Runtime {
    /// Runs one flush: every pending update, then measure and position.
    ///
    /// Work scheduled by hooks is picked up within the same flush, but a
    /// node's `do_update` runs at most once per flush; requests made for a
    /// node after its update are dropped when the flush ends. A hook error
    /// aborts the flush and drops whatever was still scheduled. Calling
    /// this from inside a hook does nothing.
    pub fn update_all(&self) -> Result<(), WidgetError> {
        let inner = &*self.inner;
        if inner.flushing.replace(true) {
            return Ok(());
        }
        inner.clear_frame_request();
        let _guard = FlushGuard(inner);

        let mut stats = FlushStats::default();
        loop {
            stats.passes += 1;
            self.run_updates(&mut stats)?;
            self.run_anchored_positions(&mut stats)?;
            self.run_leaf_positions(&mut stats)?;

            if !inner.has_flush_work() {
                break;
            }
            if stats.passes >= inner.config.max_flush_passes {
                log::warn!(
                    "flush still dirty after {} passes; dropping {} updates and {} positions",
                    stats.passes,
                    self.pending_updates(),
                    self.pending_positions()
                );
                break;
            }
        }

        log::debug!(
            "flush: {} passes, {} updates, {} anchored and {} leaf positions",
            stats.passes,
            stats.updates,
            stats.ancestors,
            stats.leaves
        );
        Ok(())
    }

    fn run_updates(&self, stats: &mut FlushStats) -> Result<(), WidgetError> {
        let inner = &*self.inner;
        loop {
            let next = inner.queue.borrow_mut().updates.next_unvisited();
            let Some(node) = next else {
                return Ok(());
            };
            stats.updates += 1;
            if stats.updates > inner.config.max_update_iterations {
                return Err(WidgetError::assertion(format!(
                    "update cycle: more than {} updates in one flush, last {node:?}",
                    inner.config.max_update_iterations
                )));
            }

            let request = node.take_pending().unwrap_or_else(UpdateRequest::all);
            node.run_update_hooks(&request)?;
            node.notify_updated();
            node.position();
        }
    }

    // Lays out every dirty positioning ancestor of a dirty node before the
    // node itself, removing it from the batch.
    fn run_anchored_positions(&self, stats: &mut FlushStats) -> Result<(), WidgetError> {
        let inner = &*self.inner;
        inner.queue.borrow_mut().positions.rewind();
        loop {
            let next = inner.queue.borrow_mut().positions.next_unvisited();
            let Some(node) = next else {
                return Ok(());
            };

            let mut chain: Vec<Node> = Vec::new();
            let mut cursor = node.clone();
            loop {
                let parent = match cursor.positioning_parent() {
                    Some(parent) => parent,
                    None if cursor.is_root() => break,
                    None => {
                        return Err(WidgetError::assertion(format!(
                            "{cursor:?} is scheduled for positioning but has no positioning parent"
                        )));
                    }
                };
                if parent == node || chain.contains(&parent) {
                    return Err(WidgetError::assertion(format!(
                        "positioning cycle through {parent:?}"
                    )));
                }
                if !inner.queue.borrow().positions.contains(parent.key()) {
                    break;
                }
                chain.push(parent.clone());
                cursor = parent;
            }

            for ancestor in chain.into_iter().rev() {
                inner.queue.borrow_mut().positions.remove(ancestor.key());
                stats.ancestors += 1;
                ancestor.run_measure_hooks()?;
                ancestor.run_position_hooks()?;
            }
        }
    }

    fn run_leaf_positions(&self, stats: &mut FlushStats) -> Result<(), WidgetError> {
        let leaves = self.inner.queue.borrow_mut().positions.drain_all();
        stats.leaves += leaves.len();
        for node in &leaves {
            node.run_measure_hooks()?;
        }
        for node in &leaves {
            node.run_position_hooks()?;
        }
        Ok(())
    }
}

impl Node {
    /// Requests a full update.
    pub fn update(&self) {
        self.request_update(None);
    }

    /// Requests an update with `request` merged into what is pending.
    pub fn update_with(&self, request: UpdateRequest) {
        self.request_update(Some(request));
    }

    pub(crate) fn request_update(&self, request: Option<UpdateRequest>) {
        self.inner
            .pending
            .borrow_mut()
            .get_or_insert_with(UpdateRequest::new)
            .merge(request);
        if !self.is_bound() {
            return;
        }
        if let Some(runtime) = self.runtime() {
            runtime.inner.schedule_update(self);
        }
    }

    /// Drops the pending request and any scheduler membership.
    pub fn cancel_update(&self) {
        self.inner.pending.borrow_mut().take();
        if let Some(runtime) = self.runtime() {
            runtime.inner.cancel(self);
        }
    }

    /// Schedules measure and position for a bound, position-capable node.
    pub fn position(&self) {
        if !self.can_position() || !self.is_bound() {
            return;
        }
        if let Some(runtime) = self.runtime() {
            runtime.inner.schedule_position(self);
        }
    }

    pub fn pending_update(&self) -> Option<UpdateRequest> {
        self.inner.pending.borrow().clone()
    }

    pub(crate) fn take_pending(&self) -> Option<UpdateRequest> {
        self.inner.pending.borrow_mut().take()
    }

    pub(crate) fn run_update_hooks(&self, request: &UpdateRequest) -> Result<(), WidgetError> {
        log::trace!("update {self:?}");
        let hooks = self.inner.hooks.borrow().update.clone();
        for hook in hooks {
            hook.do_update(self, request)?;
        }
        Ok(())
    }

    pub(crate) fn run_measure_hooks(&self) -> Result<(), WidgetError> {
        log::trace!("measure {self:?}");
        let hooks = self.inner.hooks.borrow().measure.clone();
        for hook in hooks {
            hook.do_measure(self)?;
        }
        Ok(())
    }

    pub(crate) fn run_position_hooks(&self) -> Result<(), WidgetError> {
        log::trace!("position {self:?}");
        let hooks = self.inner.hooks.borrow().position.clone();
        for hook in hooks {
            hook.do_position(self)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
