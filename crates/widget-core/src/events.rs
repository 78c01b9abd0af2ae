//! Runtime-wide notifications.
//!
//! Listeners subscribe to a [`Topic`]: either every event of a kind, or only
//! the events of a kind emitted for one node id. Id-scoped topics are how
//! `bind_id` props follow nodes that live elsewhere in the tree.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::node::Node;
use crate::value::Value;

pub type ListenerId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Init,
    Bind,
    IdChanged,
    PropChanged,
    LayoutChanged,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic {
    kind: EventKind,
    scope: Option<String>,
}

impl Topic {
    /// Every event of `kind`.
    pub fn global(kind: EventKind) -> Self {
        Self { kind, scope: None }
    }

    /// Events of `kind` emitted for the node with id `id`.
    pub fn scoped(id: &str, kind: EventKind) -> Self {
        Self {
            kind,
            scope: Some(id.to_string()),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

#[derive(Clone, Debug)]
pub enum Event {
    Init {
        node: Node,
    },
    Bind {
        node: Node,
        on: bool,
    },
    IdChanged {
        node: Node,
        id: Option<String>,
        previous: Option<String>,
    },
    PropChanged {
        node: Node,
        name: String,
        value: Value,
        previous: Value,
    },
    LayoutChanged {
        node: Node,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Init { .. } => EventKind::Init,
            Event::Bind { .. } => EventKind::Bind,
            Event::IdChanged { .. } => EventKind::IdChanged,
            Event::PropChanged { .. } => EventKind::PropChanged,
            Event::LayoutChanged { .. } => EventKind::LayoutChanged,
        }
    }

    pub fn node(&self) -> &Node {
        match self {
            Event::Init { node }
            | Event::Bind { node, .. }
            | Event::IdChanged { node, .. }
            | Event::PropChanged { node, .. }
            | Event::LayoutChanged { node } => node,
        }
    }
}

type Listener = Rc<dyn Fn(&Event)>;

pub(crate) struct Notifier {
    next_id: Cell<ListenerId>,
    listeners: RefCell<Vec<(ListenerId, Topic, Listener)>>,
}

impl Notifier {
    pub(crate) fn new() -> Self {
        Self {
            next_id: Cell::new(1),
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn listen(&self, topic: Topic, listener: Listener) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, topic, listener));
        id
    }

    pub(crate) fn unlisten(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|(entry, _, _)| *entry == id) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    // Listeners may subscribe or unsubscribe while being notified, so the
    // matching set is captured before any of them runs.
    pub(crate) fn announce(&self, topic: &Topic, event: &Event) {
        let targets: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, entry, _)| entry == topic)
            .map(|(_, _, listener)| Rc::clone(listener))
            .collect();
        for listener in targets {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }
}
