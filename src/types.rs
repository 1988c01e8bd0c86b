//! Core types shared across the engine.
//!
//! - [`PropValue`] / [`Props`] - the configuration mapping carried by elements and fibers
//! - [`EventHandler`] / [`Event`] - handler values bound as host listeners
//! - [`EffectTag`] / [`FiberFlags`] - diff bookkeeping on fibers
//! - [`Phase`] - work loop state

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::primitives::Element;

// =============================================================================
// Events
// =============================================================================

/// Event delivered by the host to a bound handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Host event name (`click`, `keydown`, ...).
    pub name: String,
    /// Payload the host attached to the event.
    pub detail: PropValue,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), detail: PropValue::Null }
    }

    pub fn with_detail(name: impl Into<String>, detail: impl Into<PropValue>) -> Self {
        Self { name: name.into(), detail: detail.into() }
    }
}

/// Event handler stored as a property value.
///
/// Two handlers are equal only if they are the same allocation, so a closure
/// recreated on every render always counts as a changed property.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event);
    }
}

impl PartialEq for EventHandler {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0))
    }
}

/// Host event name a handler property binds to.
///
/// `onClick` binds to `click`, `onKeyDown` to `keydown`; keys without the
/// `on` prefix bind under their own name.
pub fn event_name(key: &str) -> String {
    match key.strip_prefix("on") {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest.to_ascii_lowercase(),
        _ => key.to_string(),
    }
}

// =============================================================================
// Property Values
// =============================================================================

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropValue {
    /// Absent value. Applying it removes the property from the host node.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Handler(EventHandler),
}

impl PropValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_handler(&self) -> Option<&EventHandler> {
        match self {
            Self::Handler(handler) => Some(handler),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Handler(_) => f.write_str("[handler]"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

impl From<EventHandler> for PropValue {
    fn from(value: EventHandler) -> Self {
        Self::Handler(value)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// =============================================================================
// Props - Configuration mapping
// =============================================================================

/// Configuration mapping of an element or fiber.
///
/// Entries keep insertion order, which is also the order properties are
/// applied to a host node. The `children` entry is reserved: functional
/// component elements carry their children here, host elements keep theirs
/// on the element itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Props {
    entries: IndexMap<String, PropValue>,
    children: Rc<[Element]>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style handler insert.
    pub fn on(self, key: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Self {
        self.with(key, EventHandler::new(handler))
    }

    /// Insert an entry. Writes to the reserved `children` key are ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        let key = key.into();
        if key == "children" {
            return;
        }
        self.entries.insert(key, value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The reserved `children` entry.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub(crate) fn set_children(&mut self, children: Rc<[Element]>) {
        self.children = children;
    }
}

// =============================================================================
// Fiber Bookkeeping
// =============================================================================

/// Outcome of the diff for one fiber, consumed at commit and reset after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectTag {
    #[default]
    None,
    Placement,
    Update,
    Deletion,
}

bitflags::bitflags! {
    /// Scheduling marks on a fiber.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FiberFlags: u8 {
        /// A hook on this fiber has queued updates.
        const PENDING = 1 << 0;
        /// Some descendant has queued hook updates.
        const SUBTREE_PENDING = 1 << 1;
        /// Children were adopted from the alternate instead of reconciled.
        const ADOPTED_CHILDREN = 1 << 2;
        /// Host listeners were detached at deletion.
        const DETACHED = 1 << 3;
    }
}

impl FiberFlags {
    /// Marks that force a fiber to be visited.
    pub const WORK: Self = Self::PENDING.union(Self::SUBTREE_PENDING);
}

/// Work loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Reconciling,
    Committing,
}

// =============================================================================
// Tests
// =============================================================================
