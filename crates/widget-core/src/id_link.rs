//! Live references from a `bind_id` prop to the node carrying that id.
//!
//! While the owning node is bound the link listens for the target id being
//! bound, unbound or renamed. The target is held weakly; the optional
//! `on_ref` callback sees every resolve and release.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::events::{Event, EventKind, ListenerId, Topic};
use crate::node::{Node, WeakNode};
use crate::prop::RefCallback;
use crate::runtime::RuntimeHandle;
use crate::value::Value;

#[derive(Default)]
struct LinkState {
    id: Option<String>,
    enabled: bool,
    listeners: Vec<ListenerId>,
    target: Option<WeakNode>,
}

pub(crate) struct IdLink {
    prop: String,
    owner: WeakNode,
    runtime: RuntimeHandle,
    on_ref: Option<RefCallback>,
    state: RefCell<LinkState>,
}

impl IdLink {
    pub(crate) fn install(owner: &Node, prop: &str, on_ref: Option<RefCallback>) -> Rc<Self> {
        let link = Rc::new(Self {
            prop: prop.to_string(),
            owner: owner.downgrade(),
            runtime: owner.inner.runtime.clone(),
            on_ref,
            state: RefCell::new(LinkState::default()),
        });
        let weak = Rc::downgrade(&link);
        owner.on_bind(move |node, on| {
            if let Some(link) = weak.upgrade() {
                link.set_enabled(node, on);
            }
        });
        link
    }

    pub(crate) fn target(&self) -> Option<Node> {
        self.state
            .borrow()
            .target
            .as_ref()
            .and_then(WeakNode::upgrade)
    }

    fn set_enabled(self: &Rc<Self>, owner: &Node, on: bool) {
        if on {
            {
                let mut state = self.state.borrow_mut();
                if state.enabled {
                    return;
                }
                state.enabled = true;
            }
            self.state.borrow_mut().id = owner.get_str(&self.prop);
            self.subscribe();
        } else {
            if !self.state.borrow().enabled {
                return;
            }
            self.state.borrow_mut().enabled = false;
            self.unsubscribe();
            self.release();
        }
    }

    /// Follows a new id assigned to the owning prop. The current target is
    /// released first, even when the new id names the same node.
    pub(crate) fn retarget(self: &Rc<Self>, id: Option<String>) {
        {
            let mut state = self.state.borrow_mut();
            if state.id == id {
                return;
            }
            state.id = id;
            if !state.enabled {
                return;
            }
        }
        self.unsubscribe();
        self.release();
        self.subscribe();
    }

    fn subscribe(self: &Rc<Self>) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        let Some(id) = self.state.borrow().id.clone() else {
            self.release();
            return;
        };

        let weak: Weak<Self> = Rc::downgrade(self);
        let on_bind = runtime.listen(Topic::scoped(&id, EventKind::Bind), move |event| {
            if let (Some(link), Event::Bind { node, on }) = (weak.upgrade(), event) {
                link.resolve(node, *on);
            }
        });

        let weak: Weak<Self> = Rc::downgrade(self);
        let on_rename = runtime.listen(Topic::scoped(&id, EventKind::IdChanged), move |event| {
            if let (Some(link), Event::IdChanged { id, .. }) = (weak.upgrade(), event) {
                link.follow_rename(id.clone());
            }
        });
        self.state.borrow_mut().listeners = vec![on_bind, on_rename];

        match runtime.node_by_id(&id) {
            Some(target) if target.is_bound() => self.resolve(&target, true),
            _ => self.release(),
        }
    }

    fn unsubscribe(&self) {
        let listeners = std::mem::take(&mut self.state.borrow_mut().listeners);
        if let Some(runtime) = self.runtime.upgrade() {
            for listener in listeners {
                runtime.unlisten(listener);
            }
        }
    }

    fn follow_rename(&self, id: Option<String>) {
        let Some(owner) = self.owner.upgrade() else {
            return;
        };
        if let Err(err) = owner.set(&self.prop, Value::from(id)) {
            log::warn!("{owner:?}: cannot follow renamed reference `{}`: {err}", self.prop);
        }
    }

    fn resolve(&self, target: &Node, on: bool) {
        let current = self.target();
        if on {
            if current.as_ref() == Some(target) {
                return;
            }
            self.release();
            self.state.borrow_mut().target = Some(target.downgrade());
            self.notify(target, true);
        } else if current.as_ref() == Some(target) {
            self.state.borrow_mut().target = None;
            self.notify(target, false);
        }
    }

    fn release(&self) {
        let previous = self.state.borrow_mut().target.take();
        if let Some(target) = previous.and_then(|weak| weak.upgrade()) {
            self.notify(&target, false);
        }
    }

    fn notify(&self, target: &Node, on: bool) {
        log::trace!("reference `{}` -> {target:?}: {on}", self.prop);
        if let (Some(callback), Some(owner)) = (&self.on_ref, self.owner.upgrade()) {
            callback(&owner, target, on);
        }
    }
}

impl Drop for IdLink {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
