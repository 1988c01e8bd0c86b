//! Functional components.
//!
//! A component is a render function from props to at most one element. It
//! owns no host node; its output becomes the fiber's children. State lives in
//! hook slots reached through the [`Hooks`] handle passed to every render.

use std::fmt;
use std::rc::Rc;

use super::element::Element;
use crate::state::Hooks;
use crate::types::Props;

type RenderFn = dyn Fn(&Props, &mut Hooks<'_>) -> Option<Element>;

/// Reference to a functional component.
///
/// Identity is the identity of the render function: clones of one
/// `Component` match each other, two `Component::new` calls never do.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<F>(name: impl Into<Rc<str>>, render: F) -> Self
    where
        F: Fn(&Props, &mut Hooks<'_>) -> Option<Element> + 'static,
    {
        Self { name: name.into(), render: Rc::new(render) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }

    pub(crate) fn render(&self, props: &Props, hooks: &mut Hooks<'_>) -> Option<Element> {
        (self.render)(props, hooks)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component").field("name", &self.name).finish_non_exhaustive()
    }
}
