#![doc = r"Core runtime for retained-mode widgets: a registry that turns type names
into live nodes, reactive properties mirrored to host attributes, a bind
lifecycle that follows the visual tree, and a deferred scheduler that batches
update, measure and position work into one flush per frame."]

mod bind;
pub mod collections;
mod config;
mod error;
mod events;
mod id_link;
mod node;
mod platform;
mod prop;
mod registry;
mod runtime;
mod scheduler;
mod value;

pub use config::RuntimeConfig;
pub use error::WidgetError;
pub use events::{Event, EventKind, ListenerId, Topic};
pub use node::{Measurable, Node, NodeKey, ObserverId, Positionable, Updatable, WeakNode};
pub use platform::FrameScheduler;
pub use prop::{PropKind, PropSpec, RefCallback};
pub use registry::{Constructor, CreateOptions, Template, TypeResolver};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use scheduler::UpdateRequest;
pub use value::{PropValues, Value};

pub mod prelude {
    pub use crate::{
        CreateOptions, Event, EventKind, Node, PropKind, PropSpec, PropValues, Runtime,
        Template, Topic, UpdateRequest, Value, WidgetError,
    };
}
