//! Type registry and instantiation.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::collections::HashMap;
use crate::events::Event;
use crate::node::Node;
use crate::runtime::Runtime;
use crate::value::{PropValues, Value};
use crate::WidgetError;

/// Builds a freshly allocated node: installs props and hooks, creates
/// children, and may suggest initial prop values.
pub type Constructor = Rc<dyn Fn(&Node) -> Result<Option<PropValues>, WidgetError>>;

/// Maps an id that is not registered yet to the type it should be created as.
pub type TypeResolver = Rc<dyn Fn(&str) -> Option<String>>;

#[derive(Default)]
pub(crate) struct Registry {
    constructors: HashMap<String, Constructor>,
    resolver: Option<TypeResolver>,
}

/// What [`Runtime::create`] should produce.
#[derive(Clone, Debug)]
pub enum Template {
    /// An existing node, returned unchanged.
    Instance(Node),
    /// A registered type name.
    Type(String),
    /// An id: the live node carrying it, or a new node of the type the
    /// resolver reports for it.
    Id(String),
}

impl From<Node> for Template {
    fn from(node: Node) -> Self {
        Template::Instance(node)
    }
}

impl From<&Node> for Template {
    fn from(node: &Node) -> Self {
        Template::Instance(node.clone())
    }
}

impl From<&str> for Template {
    fn from(name: &str) -> Self {
        Template::Type(name.to_string())
    }
}

impl From<String> for Template {
    fn from(name: String) -> Self {
        Template::Type(name)
    }
}

/// Call-site inputs of [`Runtime::create`].
#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    id: Option<String>,
    props: PropValues,
    attrs: IndexMap<String, String>,
    children: Vec<Node>,
}

impl CreateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn prop(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.props.insert(name.to_string(), value.into());
        self
    }

    /// Declarative attribute, harvested into props that read it.
    pub fn attr(mut self, name: &str, text: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), text.into());
        self
    }

    /// Child appended before the constructor runs.
    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }
}

impl Runtime {
    /// Registers `constructor` for `name`.
    pub fn register(
        &self,
        name: &str,
        constructor: impl Fn(&Node) -> Result<Option<PropValues>, WidgetError> + 'static,
    ) -> Result<(), WidgetError> {
        let mut registry = self.inner.registry.borrow_mut();
        if registry.constructors.contains_key(name) {
            return Err(WidgetError::DuplicateRegistration {
                name: name.to_string(),
            });
        }
        registry
            .constructors
            .insert(name.to_string(), Rc::new(constructor));
        log::debug!("registered widget type `{name}`");
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .inner
            .registry
            .borrow_mut()
            .constructors
            .remove(name)
            .is_some();
        if removed {
            log::debug!("unregistered widget type `{name}`");
        }
        removed
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.registry.borrow().constructors.contains_key(name)
    }

    /// Chains `extension` after the constructor registered for `name`.
    /// Suggestions of the extension win over the base constructor's.
    pub fn extend(
        &self,
        name: &str,
        extension: impl Fn(&Node) -> Result<Option<PropValues>, WidgetError> + 'static,
    ) -> Result<(), WidgetError> {
        let mut registry = self.inner.registry.borrow_mut();
        let Some(base) = registry.constructors.get(name).cloned() else {
            return Err(WidgetError::UnknownType {
                name: name.to_string(),
            });
        };
        let chained: Constructor = Rc::new(move |node: &Node| {
            let mut suggested = base(node)?.unwrap_or_default();
            if let Some(extra) = extension(node)? {
                suggested.extend(extra);
            }
            Ok((!suggested.is_empty()).then_some(suggested))
        });
        registry.constructors.insert(name.to_string(), chained);
        log::debug!("extended widget type `{name}`");
        Ok(())
    }

    pub fn set_type_resolver(&self, resolver: impl Fn(&str) -> Option<String> + 'static) {
        self.inner.registry.borrow_mut().resolver = Some(Rc::new(resolver));
    }

    fn constructor(&self, name: &str) -> Result<Constructor, WidgetError> {
        self.inner
            .registry
            .borrow()
            .constructors
            .get(name)
            .cloned()
            .ok_or_else(|| WidgetError::UnknownType {
                name: name.to_string(),
            })
    }

    fn resolve_type(&self, id: &str) -> Result<String, WidgetError> {
        let resolver = self.inner.registry.borrow().resolver.clone();
        match resolver.and_then(|resolve| resolve(id)) {
            Some(name) => Ok(name),
            None => {
                log::warn!("cannot create `{id}`: no live node and no type for that id");
                Err(WidgetError::UnknownType {
                    name: id.to_string(),
                })
            }
        }
    }

    /// Creates (or returns) a live node.
    ///
    /// Initial values are merged from the call-site options, then the
    /// constructor's suggestions, then the declarative attributes; earlier
    /// sources win. They are assigned through the regular setters before
    /// the node counts as initialized, so no change is published for them.
    pub fn create(
        &self,
        template: impl Into<Template>,
        options: CreateOptions,
    ) -> Result<Node, WidgetError> {
        let (kind, id) = match template.into() {
            Template::Instance(node) => return Ok(node),
            Template::Id(id) => {
                if let Some(node) = self.node_by_id(&id) {
                    return Ok(node);
                }
                (self.resolve_type(&id)?, Some(id))
            }
            Template::Type(kind) => {
                if let Some(node) = options.id.as_deref().and_then(|id| self.node_by_id(id)) {
                    return Ok(node);
                }
                (kind, options.id.clone())
            }
        };
        let constructor = self.constructor(&kind)?;

        let node = Node::new(self.handle(), &kind);
        for (name, text) in &options.attrs {
            node.set_attr(name, text.clone());
        }
        node.set_id(id.as_deref())?;
        for child in &options.children {
            node.append_child(child)?;
        }

        let declared = node.attrs();
        let suggested = constructor(&node)?.unwrap_or_default();
        let harvested = node.harvest_attr_values(&declared);

        let mut values = options.props;
        for (name, value) in suggested.into_iter().chain(harvested) {
            values.entry(name).or_insert(value);
        }

        node.inner.initialized.set(Some(false));
        for (name, value) in values {
            node.set(&name, value)?;
        }
        node.inner.initialized.set(Some(true));
        node.run_init_hooks();

        log::trace!("created {node:?}");
        if let Some(id) = node.id() {
            self.inner
                .emit(Event::Init { node: node.clone() }, Some(&id));
        }
        Ok(node)
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
