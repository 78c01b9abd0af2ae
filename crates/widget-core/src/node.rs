use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::collections::{FastIndexMap, HashMap};
use crate::events::Event;
use crate::prop::PropSlot;
use crate::runtime::{Runtime, RuntimeHandle};
use crate::scheduler::UpdateRequest;
use crate::value::Value;
use crate::WidgetError;

/// Process-unique identity of a node, used for scheduler membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

static NEXT_NODE_KEY: AtomicU64 = AtomicU64::new(1);

fn next_node_key() -> NodeKey {
    NodeKey(NEXT_NODE_KEY.fetch_add(1, Ordering::Relaxed))
}

/// Mutates a node from its accumulated [`UpdateRequest`].
pub trait Updatable {
    fn do_update(&self, node: &Node, request: &UpdateRequest) -> Result<(), WidgetError>;
}

/// Reads layout. Runs before any [`Positionable`] of the same batch.
pub trait Measurable {
    fn do_measure(&self, node: &Node) -> Result<(), WidgetError>;
}

/// Writes layout computed from the last measurement.
pub trait Positionable {
    fn do_position(&self, node: &Node) -> Result<(), WidgetError>;
}

impl<F> Updatable for F
where
    F: Fn(&Node, &UpdateRequest) -> Result<(), WidgetError>,
{
    fn do_update(&self, node: &Node, request: &UpdateRequest) -> Result<(), WidgetError> {
        self(node, request)
    }
}

impl<F> Measurable for F
where
    F: Fn(&Node) -> Result<(), WidgetError>,
{
    fn do_measure(&self, node: &Node) -> Result<(), WidgetError> {
        self(node)
    }
}

impl<F> Positionable for F
where
    F: Fn(&Node) -> Result<(), WidgetError>,
{
    fn do_position(&self, node: &Node) -> Result<(), WidgetError> {
        self(node)
    }
}

pub(crate) type BindHook = Rc<dyn Fn(&Node, bool)>;
pub(crate) type InitHook = Rc<dyn Fn(&Node)>;
pub(crate) type PropObserver = Rc<dyn Fn(&Node, &str, &Value, &Value)>;
pub(crate) type UpdateObserver = Rc<dyn Fn(&Node)>;

/// Handle of an observer added with [`Node::observe_updates`].
pub type ObserverId = u64;

#[derive(Default)]
pub(crate) struct NodeHooks {
    pub(crate) update: Vec<Rc<dyn Updatable>>,
    pub(crate) measure: Vec<Rc<dyn Measurable>>,
    pub(crate) position: Vec<Rc<dyn Positionable>>,
    pub(crate) bind: Vec<BindHook>,
    pub(crate) init: Vec<InitHook>,
    pub(crate) prop_changed: Vec<PropObserver>,
    pub(crate) updated: Vec<(ObserverId, UpdateObserver)>,
}

pub(crate) struct NodeInner {
    pub(crate) key: NodeKey,
    kind: String,
    pub(crate) runtime: RuntimeHandle,
    pub(crate) element_id: RefCell<Option<String>>,
    pub(crate) bound: Cell<Option<bool>>,
    pub(crate) binding: Cell<bool>,
    pub(crate) root: Cell<bool>,
    pub(crate) initialized: Cell<Option<bool>>,
    pub(crate) init_ran: Cell<bool>,
    next_observer: Cell<ObserverId>,
    parent: RefCell<Weak<NodeInner>>,
    children: RefCell<Vec<Node>>,
    anchor: RefCell<Option<Weak<NodeInner>>>,
    attrs: RefCell<IndexMap<String, String>>,
    pub(crate) props: RefCell<FastIndexMap<String, Rc<PropSlot>>>,
    pub(crate) extras: RefCell<HashMap<String, Value>>,
    pub(crate) pending: RefCell<Option<UpdateRequest>>,
    pub(crate) hooks: RefCell<NodeHooks>,
}

impl Drop for NodeInner {
    fn drop(&mut self) {
        if let Some(id) = self.element_id.get_mut().take() {
            if let Some(runtime) = self.runtime.upgrade() {
                runtime.inner.forget_dead_id(&id);
            }
        }
    }
}

/// Strong handle to a live widget instance.
///
/// Handles are cheap to clone. The tree owns nodes structurally: a parent
/// holds its children, children only point back weakly.
#[derive(Clone)]
pub struct Node {
    pub(crate) inner: Rc<NodeInner>,
}

/// Non-owning handle, used for popup targets and id references.
#[derive(Clone, Default)]
pub struct WeakNode(Weak<NodeInner>);

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(|inner| Node { inner })
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({node:?})"),
            None => f.write_str("WeakNode(dropped)"),
        }
    }
}

impl Node {
    pub(crate) fn new(runtime: RuntimeHandle, kind: &str) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                key: next_node_key(),
                kind: kind.to_string(),
                runtime,
                element_id: RefCell::new(None),
                bound: Cell::new(None),
                binding: Cell::new(false),
                root: Cell::new(false),
                initialized: Cell::new(None),
                init_ran: Cell::new(false),
                next_observer: Cell::new(1),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                anchor: RefCell::new(None),
                attrs: RefCell::new(IndexMap::new()),
                props: RefCell::new(FastIndexMap::default()),
                extras: RefCell::new(HashMap::new()),
                pending: RefCell::new(None),
                hooks: RefCell::new(NodeHooks::default()),
            }),
        }
    }

    pub fn key(&self) -> NodeKey {
        self.inner.key
    }

    /// Registered type this node was created from.
    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    pub fn id(&self) -> Option<String> {
        self.inner.element_id.borrow().clone()
    }

    pub fn runtime(&self) -> Option<Runtime> {
        self.inner.runtime.upgrade()
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.inner))
    }

    /// `None` while the constructor runs, `Some(false)` while initial prop
    /// values are assigned, `Some(true)` afterwards.
    pub fn initialized(&self) -> Option<bool> {
        self.inner.initialized.get()
    }

    /// Renames the node. The new id must not belong to another live node.
    pub fn set_id(&self, id: Option<&str>) -> Result<(), WidgetError> {
        let previous = self.id();
        if previous.as_deref() == id {
            return Ok(());
        }
        if let Some(runtime) = self.runtime() {
            if let Some(id) = id {
                runtime.inner.claim_id(id, self)?;
            }
            if let Some(previous) = previous.as_deref() {
                runtime.inner.release_id(previous, self);
            }
        }
        *self.inner.element_id.borrow_mut() = id.map(str::to_owned);
        self.write_attr("id", id.map(str::to_owned));
        if self.initialized() == Some(true) {
            if let Some(runtime) = self.runtime() {
                let scope = previous.clone();
                runtime.inner.emit(
                    Event::IdChanged {
                        node: self.clone(),
                        id: id.map(str::to_owned),
                        previous,
                    },
                    scope.as_deref(),
                );
            }
        }
        Ok(())
    }

    // tree -----------------------------------------------------------------

    pub fn parent(&self) -> Option<Node> {
        self.inner.parent.borrow().upgrade().map(|inner| Node { inner })
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_ancestor_of(&self, other: &Node) -> bool {
        let mut cursor = Some(other.clone());
        while let Some(node) = cursor {
            if &node == self {
                return true;
            }
            cursor = node.parent();
        }
        false
    }

    pub fn append_child(&self, child: &Node) -> Result<(), WidgetError> {
        let index = self.child_count();
        self.insert_child(index, child)
    }

    /// Moves `child` under this node. Purely structural: bind state is not
    /// re-evaluated, see [`Runtime::attach`].
    pub fn insert_child(&self, index: usize, child: &Node) -> Result<(), WidgetError> {
        if child.is_ancestor_of(self) {
            return Err(WidgetError::assertion(format!(
                "cannot insert {child:?} under its own descendant {self:?}"
            )));
        }
        child.detach_from_parent();
        let mut children = self.inner.children.borrow_mut();
        let index = index.min(children.len());
        children.insert(index, child.clone());
        *child.inner.parent.borrow_mut() = Rc::downgrade(&self.inner);
        Ok(())
    }

    pub fn remove_child(&self, child: &Node) -> bool {
        let removed = {
            let mut children = self.inner.children.borrow_mut();
            children
                .iter()
                .position(|c| c == child)
                .map(|index| children.remove(index))
        };
        match removed {
            Some(child) => {
                *child.inner.parent.borrow_mut() = Weak::new();
                true
            }
            None => false,
        }
    }

    pub fn detach_from_parent(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => false,
        }
    }

    /// Positions this node relative to `anchor` instead of its tree parent.
    pub fn set_anchor(&self, anchor: Option<&Node>) {
        *self.inner.anchor.borrow_mut() = anchor.map(|node| Rc::downgrade(&node.inner));
    }

    pub fn anchor(&self) -> Option<Node> {
        self.inner
            .anchor
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Node { inner })
    }

    /// The node that must be laid out before this one: the anchor while it
    /// is alive, the tree parent otherwise.
    pub fn positioning_parent(&self) -> Option<Node> {
        self.anchor().or_else(|| self.parent())
    }

    pub fn is_root(&self) -> bool {
        self.inner.root.get()
    }

    // attributes -----------------------------------------------------------

    pub fn attr(&self, name: &str) -> Option<String> {
        self.inner.attrs.borrow().get(name).cloned()
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.inner.attrs.borrow().contains_key(name)
    }

    /// Writes host attribute text. No prop is updated.
    pub fn set_attr(&self, name: &str, text: impl Into<String>) {
        self.inner
            .attrs
            .borrow_mut()
            .insert(name.to_string(), text.into());
    }

    pub fn remove_attr(&self, name: &str) -> Option<String> {
        self.inner.attrs.borrow_mut().shift_remove(name)
    }

    pub fn attrs(&self) -> IndexMap<String, String> {
        self.inner.attrs.borrow().clone()
    }

    pub(crate) fn write_attr(&self, name: &str, text: Option<String>) {
        match text {
            Some(text) => self.set_attr(name, text),
            None => {
                self.remove_attr(name);
            }
        }
    }

    // hooks ----------------------------------------------------------------

    // Nodes that opt into lifecycle hooks track their bind state explicitly
    // from then on instead of inheriting it.
    pub(crate) fn track_bound(&self) {
        if self.inner.bound.get().is_none() {
            self.inner.bound.set(Some(self.is_bound()));
        }
    }

    pub fn on_bind(&self, hook: impl Fn(&Node, bool) + 'static) {
        self.track_bound();
        self.inner.hooks.borrow_mut().bind.push(Rc::new(hook));
    }

    /// Runs once, after every initial prop value has been assigned.
    pub fn on_init(&self, hook: impl Fn(&Node) + 'static) {
        self.inner.hooks.borrow_mut().init.push(Rc::new(hook));
    }

    pub fn on_update(
        &self,
        hook: impl Fn(&Node, &UpdateRequest) -> Result<(), WidgetError> + 'static,
    ) {
        self.add_updatable(Rc::new(hook));
    }

    pub fn on_measure(&self, hook: impl Fn(&Node) -> Result<(), WidgetError> + 'static) {
        let hook: Rc<dyn Measurable> = Rc::new(hook);
        self.add_measurable(hook);
    }

    pub fn on_position(&self, hook: impl Fn(&Node) -> Result<(), WidgetError> + 'static) {
        let hook: Rc<dyn Positionable> = Rc::new(hook);
        self.add_positionable(hook);
    }

    pub fn add_updatable(&self, hook: Rc<dyn Updatable>) {
        self.track_bound();
        self.inner.hooks.borrow_mut().update.push(hook);
    }

    pub fn add_measurable(&self, hook: Rc<dyn Measurable>) {
        self.track_bound();
        self.inner.hooks.borrow_mut().measure.push(hook);
    }

    pub fn add_positionable(&self, hook: Rc<dyn Positionable>) {
        self.track_bound();
        self.inner.hooks.borrow_mut().position.push(hook);
    }

    /// Observes public prop changes of this node.
    pub fn on_prop_changed(&self, observer: impl Fn(&Node, &str, &Value, &Value) + 'static) {
        self.inner
            .hooks
            .borrow_mut()
            .prop_changed
            .push(Rc::new(observer));
    }

    /// Observes completed updates of this node from other nodes. Unlike
    /// hooks, observers can be removed again.
    pub fn observe_updates(&self, observer: impl Fn(&Node) + 'static) -> ObserverId {
        let id = self.inner.next_observer.get();
        self.inner.next_observer.set(id + 1);
        self.inner
            .hooks
            .borrow_mut()
            .updated
            .push((id, Rc::new(observer)));
        id
    }

    pub fn unobserve_updates(&self, id: ObserverId) -> bool {
        let mut hooks = self.inner.hooks.borrow_mut();
        let before = hooks.updated.len();
        hooks.updated.retain(|(entry, _)| *entry != id);
        hooks.updated.len() != before
    }

    pub(crate) fn notify_updated(&self) {
        let observers: Vec<UpdateObserver> = self
            .inner
            .hooks
            .borrow()
            .updated
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer(self);
        }
    }

    /// Announces that the host layout of this node changed outside of any
    /// update, e.g. a resize observed by the host.
    pub fn layout_changed(&self) {
        if let Some(runtime) = self.runtime() {
            let scope = self.id();
            runtime
                .inner
                .emit(Event::LayoutChanged { node: self.clone() }, scope.as_deref());
        }
    }

    /// Whether the node takes part in the measure/position phases.
    pub fn can_position(&self) -> bool {
        let hooks = self.inner.hooks.borrow();
        !hooks.position.is_empty() || !hooks.measure.is_empty()
    }

    pub(crate) fn run_init_hooks(&self) {
        if self.inner.init_ran.replace(true) {
            return;
        }
        let hooks = self.inner.hooks.borrow().init.clone();
        for hook in hooks {
            hook(self);
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.key.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.element_id.borrow().as_deref() {
            Some(id) => write!(f, "{}#{}", self.inner.kind, id),
            None => write!(f, "{}[{}]", self.inner.kind, self.inner.key.0),
        }
    }
}
