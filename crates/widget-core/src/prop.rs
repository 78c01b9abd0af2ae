//! Reactive properties.
//!
//! `node.prop(name, spec)` installs a named getter/setter pair on a node.
//! Stored props keep their value in a slot owned by the node; computed props
//! delegate to caller-supplied functions. Every successful assignment of a
//! different value runs, in order: the `on_set` hook, attribute mirroring,
//! public change notification (unless private) and `update()`.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::events::Event;
use crate::id_link::IdLink;
use crate::node::Node;
use crate::scheduler::UpdateRequest;
use crate::value::{PropValues, Value};
use crate::WidgetError;

pub type ConvertFn = Rc<dyn Fn(Value, &Value) -> Result<Value, String>>;
pub type FromAttrFn = Rc<dyn Fn(&str) -> Value>;
pub type ToAttrFn = Rc<dyn Fn(&Value) -> Option<String>>;
pub type GetFn = Rc<dyn Fn(&Node) -> Value>;
pub type SetFn = Rc<dyn Fn(&Node, &Value, &Value) -> Result<(), WidgetError>>;
pub type SetHook = Rc<dyn Fn(&Node, &Value, &Value)>;
/// `(owner, target, on)` for `bind_id` props.
pub type RefCallback = Rc<dyn Fn(&Node, &Node, bool)>;

/// Value shape shorthand. Supplies conversion and both attribute directions
/// when no explicit converter is given.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PropKind {
    #[default]
    Any,
    Bool,
    Number,
    Str,
}

#[derive(Clone)]
pub enum Storage {
    Stored,
    Computed { get: GetFn, set: Option<SetFn> },
}

#[derive(Clone)]
pub struct PropSpec {
    storage: Storage,
    default: Option<Value>,
    kind: PropKind,
    convert: Option<ConvertFn>,
    private: bool,
    attr_name: Option<String>,
    mirror: bool,
    from_attr: Option<FromAttrFn>,
    to_attr: Option<ToAttrFn>,
    bind_id: bool,
    on_ref: Option<RefCallback>,
    on_set: Option<SetHook>,
    updates: Option<UpdateRequest>,
}

impl PropSpec {
    /// A stored prop with no default.
    pub fn new() -> Self {
        Self {
            storage: Storage::Stored,
            default: None,
            kind: PropKind::Any,
            convert: None,
            private: false,
            attr_name: None,
            mirror: false,
            from_attr: None,
            to_attr: None,
            bind_id: false,
            on_ref: None,
            on_set: None,
            updates: None,
        }
    }

    /// A prop whose value is derived by `get` on every read.
    pub fn computed(get: impl Fn(&Node) -> Value + 'static) -> Self {
        Self {
            storage: Storage::Computed {
                get: Rc::new(get),
                set: None,
            },
            ..Self::new()
        }
    }

    /// Setter for a computed prop, called with `(node, value, previous)`.
    pub fn setter(
        mut self,
        set: impl Fn(&Node, &Value, &Value) -> Result<(), WidgetError> + 'static,
    ) -> Self {
        if let Storage::Computed { set: slot, .. } = &mut self.storage {
            *slot = Some(Rc::new(set));
        }
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn kind(mut self, kind: PropKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn bool(self) -> Self {
        self.kind(PropKind::Bool)
    }

    pub fn number(self) -> Self {
        self.kind(PropKind::Number)
    }

    pub fn string(self) -> Self {
        self.kind(PropKind::Str)
    }

    /// Conversion run on every assignment as `convert(value, previous)`.
    /// An `Err` aborts the assignment with [`WidgetError::ConversionFailure`].
    pub fn convert(mut self, convert: impl Fn(Value, &Value) -> Result<Value, String> + 'static) -> Self {
        self.convert = Some(Rc::new(convert));
        self
    }

    /// Suppresses public change notifications.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    /// Mirrors the value into the host attribute `name`.
    pub fn attr(mut self, name: &str) -> Self {
        self.attr_name = Some(name.to_string());
        self.mirror = true;
        self
    }

    pub fn from_attr(mut self, parse: impl Fn(&str) -> Value + 'static) -> Self {
        self.from_attr = Some(Rc::new(parse));
        self
    }

    /// Formatter for the mirrored attribute; `None` removes the attribute.
    pub fn to_attr(mut self, format: impl Fn(&Value) -> Option<String> + 'static) -> Self {
        self.to_attr = Some(Rc::new(format));
        self.mirror = true;
        self
    }

    /// Treats the value as the id of another node and keeps a live, weak
    /// reference to it while both are bound.
    pub fn bind_id(mut self) -> Self {
        self.bind_id = true;
        self
    }

    /// Called with `(owner, target, on)` whenever a `bind_id` reference is
    /// resolved or released.
    pub fn on_ref(mut self, callback: impl Fn(&Node, &Node, bool) + 'static) -> Self {
        self.on_ref = Some(Rc::new(callback));
        self
    }

    /// Hook run after a stored value changed, as `(node, value, previous)`.
    pub fn on_set(mut self, hook: impl Fn(&Node, &Value, &Value) + 'static) -> Self {
        self.on_set = Some(Rc::new(hook));
        self
    }

    /// Options scheduled on change instead of a full update.
    pub fn updates(mut self, request: UpdateRequest) -> Self {
        self.updates = Some(request);
        self
    }

    pub fn is_stored(&self) -> bool {
        matches!(self.storage, Storage::Stored)
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn prop_kind(&self) -> PropKind {
        self.kind
    }

    /// Attribute the prop reads declared values from and mirrors to.
    pub fn attr_name<'a>(&'a self, prop: &'a str) -> &'a str {
        self.attr_name.as_deref().unwrap_or(prop)
    }

    pub(crate) fn coerce(&self, prop: &str, value: Value, previous: &Value) -> Result<Value, WidgetError> {
        let converted = match &self.convert {
            Some(convert) => convert(value, previous),
            None => match self.kind {
                PropKind::Any => Ok(value),
                PropKind::Bool => Ok(Value::Bool(value.truthy())),
                PropKind::Number => value.to_number(),
                PropKind::Str => Ok(value.to_text().map(Value::Str).unwrap_or(Value::Null)),
            },
        };
        converted.map_err(|message| WidgetError::conversion(prop, message))
    }

    pub(crate) fn parse_attr(&self, text: &str) -> Value {
        if let Some(parse) = &self.from_attr {
            return parse(text);
        }
        match self.kind {
            PropKind::Bool => Value::Bool(text != "false"),
            _ => Value::Str(text.to_string()),
        }
    }

    pub(crate) fn format_attr(&self, value: &Value) -> Option<String> {
        if let Some(format) = &self.to_attr {
            return format(value);
        }
        match self.kind {
            PropKind::Bool => value.truthy().then(String::new),
            _ => value.to_text(),
        }
    }
}

impl Default for PropSpec {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct PropSlot {
    pub(crate) spec: PropSpec,
    value: RefCell<Value>,
    pub(crate) link: Option<Rc<IdLink>>,
}

impl PropSlot {
    fn current(&self, node: &Node) -> Value {
        match &self.spec.storage {
            Storage::Stored => self.value.borrow().clone(),
            Storage::Computed { get, .. } => get(node),
        }
    }
}

impl Node {
    /// Installs property `name`.
    ///
    /// A stored prop with a default and attribute mirroring writes the
    /// default to the attribute once, silently, unless the attribute
    /// already carries text.
    pub fn prop(&self, name: &str, spec: PropSpec) -> Result<(), WidgetError> {
        if self.inner.props.borrow().contains_key(name) {
            return Err(WidgetError::assertion(format!(
                "prop `{name}` is already installed on {self:?}"
            )));
        }
        if !spec.is_stored() && spec.default.is_some() {
            return Err(WidgetError::assertion(format!(
                "computed prop `{name}` cannot declare a default"
            )));
        }
        if spec.bind_id && spec.private {
            return Err(WidgetError::assertion(format!(
                "bind_id prop `{name}` cannot be private"
            )));
        }

        let initial = spec.default.clone().unwrap_or_default();
        if spec.is_stored() && spec.mirror && !initial.is_null() {
            let attr = spec.attr_name(name).to_string();
            if !self.has_attr(&attr) {
                self.write_attr(&attr, spec.format_attr(&initial));
            }
        }

        let link = spec
            .bind_id
            .then(|| IdLink::install(self, name, spec.on_ref.clone()));
        self.inner.extras.borrow_mut().remove(name);
        self.inner.props.borrow_mut().insert(
            name.to_string(),
            Rc::new(PropSlot {
                spec,
                value: RefCell::new(initial),
                link,
            }),
        );
        Ok(())
    }

    /// Assigns `value` to prop `name`.
    ///
    /// Unknown names are stored as dynamic values without notification.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), WidgetError> {
        let slot = self.inner.props.borrow().get(name).cloned();
        let Some(slot) = slot else {
            self.inner
                .extras
                .borrow_mut()
                .insert(name.to_string(), value.into());
            return Ok(());
        };

        let previous = slot.current(self);
        let value = slot.spec.coerce(name, value.into(), &previous)?;
        if value == previous {
            return Ok(());
        }

        match &slot.spec.storage {
            Storage::Stored => {
                *slot.value.borrow_mut() = value.clone();
                if let Some(on_set) = &slot.spec.on_set {
                    on_set(self, &value, &previous);
                }
                if slot.spec.mirror {
                    let attr = slot.spec.attr_name(name);
                    self.write_attr(attr, slot.spec.format_attr(&value));
                }
            }
            Storage::Computed { set: Some(set), .. } => set(self, &value, &previous)?,
            Storage::Computed { set: None, .. } => {
                return Err(WidgetError::assertion(format!("prop `{name}` is read-only")));
            }
        }

        if let Some(link) = &slot.link {
            link.retarget(value.to_text());
        }
        if !slot.spec.private {
            self.prop_changed(name, &value, &previous);
        }
        self.request_update(slot.spec.updates.clone());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Value {
        let slot = self.inner.props.borrow().get(name).cloned();
        match slot {
            Some(slot) => slot.current(self),
            None => self
                .inner
                .extras
                .borrow()
                .get(name)
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).as_f64()
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.get(name).truthy()
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).to_text()
    }

    pub fn has_prop(&self, name: &str) -> bool {
        self.inner.props.borrow().contains_key(name)
    }

    pub fn prop_names(&self) -> Vec<String> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    pub fn prop_spec(&self, name: &str) -> Option<PropSpec> {
        self.inner
            .props
            .borrow()
            .get(name)
            .map(|slot| slot.spec.clone())
    }

    /// Node currently resolved by the `bind_id` prop `name`.
    pub fn id_ref(&self, name: &str) -> Option<Node> {
        let slot = self.inner.props.borrow().get(name).cloned();
        slot.and_then(|slot| slot.link.as_ref().and_then(|link| link.target()))
    }

    /// Publishes a change of prop `name`.
    ///
    /// Setters call this themselves. Computed props whose value changes by
    /// other means than assignment must call it explicitly. Nothing is
    /// published before the node is initialized; the runtime-wide
    /// notification additionally requires the node to be bound.
    pub fn prop_changed(&self, name: &str, value: &Value, previous: &Value) {
        if self.initialized() != Some(true) {
            return;
        }
        let observers = self.inner.hooks.borrow().prop_changed.clone();
        for observer in observers {
            observer(self, name, value, previous);
        }
        if !self.is_bound() {
            return;
        }
        if let Some(runtime) = self.runtime() {
            let scope = self.id();
            runtime.inner.emit(
                Event::PropChanged {
                    node: self.clone(),
                    name: name.to_string(),
                    value: value.clone(),
                    previous: previous.clone(),
                },
                scope.as_deref(),
            );
        }
    }

    /// Values for installed props found in `attrs`, read through each prop's
    /// attribute name and `from_attr` conversion.
    pub(crate) fn harvest_attr_values(&self, attrs: &IndexMap<String, String>) -> PropValues {
        let props = self.inner.props.borrow();
        let mut values = PropValues::new();
        for (name, slot) in props.iter() {
            if let Some(text) = attrs.get(slot.spec.attr_name(name)) {
                values.insert(name.clone(), slot.spec.parse_attr(text));
            }
        }
        values
    }
}

#[cfg(test)]
#[path = "tests/prop_tests.rs"]
mod tests;
