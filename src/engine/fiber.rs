//! Fiber - The unit of work and persistent tree node.
//!
//! Each fiber pairs an element description with its host-tree linkage and
//! diff bookkeeping. Structural links (`parent`, `child`, `sibling`) are
//! enough to walk the tree without recursion; `alternate` links a
//! work-in-progress fiber to the committed fiber at the same position and is
//! cleared at commit.

use std::rc::Rc;

use super::registry::FiberId;
use crate::primitives::{Component, Element, Tag};
use crate::state::Hook;
use crate::types::{EffectTag, FiberFlags, Props};

// =============================================================================
// FiberKind
// =============================================================================

/// Variant space of a fiber, fixed for its lifetime.
#[derive(Clone, Debug)]
pub enum FiberKind {
    /// Tree root wrapping the host root node.
    Root,
    Host(Rc<str>),
    Text(Rc<str>),
    Component(Component),
}

impl FiberKind {
    /// Whether a fiber of this kind may be reused for `tag`.
    pub fn matches(&self, tag: &Tag) -> bool {
        self.tag().is_some_and(|own| own.same_kind(tag))
    }

    /// The element tag this kind was built from. The root has none.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            FiberKind::Root => None,
            FiberKind::Host(name) => Some(Tag::Host(name.clone())),
            FiberKind::Text(text) => Some(Tag::Text(text.clone())),
            FiberKind::Component(component) => Some(Tag::Component(component.clone())),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            FiberKind::Root => "#root",
            FiberKind::Host(name) => name,
            FiberKind::Text(_) => "#text",
            FiberKind::Component(component) => component.name(),
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, FiberKind::Component(_))
    }
}

impl From<&Tag> for FiberKind {
    fn from(tag: &Tag) -> Self {
        match tag {
            Tag::Host(name) => FiberKind::Host(name.clone()),
            Tag::Text(text) => FiberKind::Text(text.clone()),
            Tag::Component(component) => FiberKind::Component(component.clone()),
        }
    }
}

// =============================================================================
// Fiber
// =============================================================================

/// One node of the fiber tree. `N` is the host node handle type.
pub struct Fiber<N> {
    pub(crate) kind: FiberKind,
    /// Latest known props.
    pub(crate) props: Rc<Props>,
    /// Child elements for host and root fibers. Components produce theirs by
    /// rendering.
    pub(crate) element_children: Rc<[Element]>,
    /// Host node, owned once created. Always `None` for components.
    pub(crate) node: Option<N>,

    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,

    pub(crate) effect: EffectTag,
    pub(crate) flags: FiberFlags,
    pub(crate) hooks: Vec<Hook>,
}

impl<N> Fiber<N> {
    /// Root fiber wrapping `node`, with `children` as its element list.
    pub fn root(node: N, children: Rc<[Element]>) -> Self {
        Self {
            node: Some(node),
            element_children: children,
            ..Self::blank(FiberKind::Root)
        }
    }

    /// Fresh fiber described by `element`.
    pub fn from_element(element: &Element, parent: Option<FiberId>) -> Self {
        Self {
            props: element.shared_props().clone(),
            element_children: element.shared_children().clone(),
            parent,
            ..Self::blank(FiberKind::from(element.tag()))
        }
    }

    fn blank(kind: FiberKind) -> Self {
        Self {
            kind,
            props: Rc::new(Props::default()),
            element_children: Rc::from(Vec::new()),
            node: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            effect: EffectTag::None,
            flags: FiberFlags::empty(),
            hooks: Vec::new(),
        }
    }

    pub fn kind(&self) -> &FiberKind {
        &self.kind
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn node(&self) -> Option<&N> {
        self.node.as_ref()
    }

    pub fn effect(&self) -> EffectTag {
        self.effect
    }

    pub fn flags(&self) -> FiberFlags {
        self.flags
    }

    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    /// Text content of a text fiber.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            FiberKind::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Whether this fiber describes the same element input as `other`.
    ///
    /// Components compare by props identity (children live there), host and
    /// root fibers also require the same child list.
    pub(crate) fn same_input(&self, other: &Fiber<N>) -> bool {
        match (&self.kind, &other.kind) {
            (FiberKind::Root, FiberKind::Root) => Rc::ptr_eq(&self.element_children, &other.element_children),
            (FiberKind::Text(a), FiberKind::Text(b)) => a == b,
            (FiberKind::Component(a), FiberKind::Component(b)) => a.ptr_eq(b) && Rc::ptr_eq(&self.props, &other.props),
            (FiberKind::Host(a), FiberKind::Host(b)) => {
                a == b
                    && Rc::ptr_eq(&self.props, &other.props)
                    && Rc::ptr_eq(&self.element_children, &other.element_children)
            }
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
