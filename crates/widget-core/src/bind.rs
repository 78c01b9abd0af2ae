//! Bind lifecycle propagation.
//!
//! Bind state is inherited from the tree. A node only records its own state
//! once it has something to react with: a lifecycle hook or an id. Binding
//! always visits a parent before its descendants, in both directions.

use std::time::Instant;

use crate::events::Event;
use crate::node::Node;
use crate::WidgetError;

impl Node {
    /// Whether the node is currently part of a live tree.
    pub fn is_bound(&self) -> bool {
        if let Some(bound) = self.inner.bound.get() {
            return bound;
        }
        match self.parent() {
            Some(parent) => parent.is_bound(),
            None => self.is_root(),
        }
    }

    /// Explicit bind state, `None` while the node inherits it.
    pub fn bound_state(&self) -> Option<bool> {
        self.inner.bound.get()
    }

    fn tracks_bound(&self) -> bool {
        self.inner.bound.get().is_some() || self.inner.element_id.borrow().is_some()
    }

    /// Binds or unbinds this node and its subtree.
    ///
    /// Children are visited from a snapshot taken after this node's hooks
    /// ran, so a hook that removes a child keeps it from being bound.
    pub fn set_bound(&self, on: bool) -> Result<(), WidgetError> {
        if !on {
            self.cancel_update();
        }

        if self.tracks_bound() {
            if self.inner.bound.get() == Some(on) {
                return Ok(());
            }
            if self.inner.binding.get() {
                return Err(WidgetError::assertion(format!(
                    "{self:?} changed its bind state from inside a bind hook"
                )));
            }
            self.inner.binding.set(true);
            let started = Instant::now();
            self.inner.bound.set(Some(on));
            self.run_bind_hooks(on);
            self.inner.binding.set(false);
            if on {
                self.update();
            }
            self.report_slow_bind(started, on);
        }

        for child in self.children() {
            child.set_bound(on)?;
        }
        Ok(())
    }

    fn run_bind_hooks(&self, on: bool) {
        log::trace!("bind {self:?}: {on}");
        let hooks = self.inner.hooks.borrow().bind.clone();
        for hook in hooks {
            hook(self, on);
        }
        let id = self.id();
        if let (Some(id), Some(runtime)) = (id, self.runtime()) {
            runtime.inner.emit(
                Event::Bind {
                    node: self.clone(),
                    on,
                },
                Some(&id),
            );
        }
    }

    fn report_slow_bind(&self, started: Instant, on: bool) {
        let threshold = self
            .runtime()
            .and_then(|runtime| runtime.config().slow_bind_threshold);
        if let Some(threshold) = threshold {
            let elapsed = started.elapsed();
            if elapsed > threshold {
                log::warn!("slow {} of {self:?}: {elapsed:?}", if on { "bind" } else { "unbind" });
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/bind_tests.rs"]
mod tests;
