//! Element Factory - Immutable descriptions of the desired UI.
//!
//! Elements are intent, not tree nodes. The reconciler consumes them to build
//! fibers and never mutates them. Cloning an element is cheap: props and
//! children are shared.
//!
//! # Example
//!
//! ```
//! use spark_fiber::{children, create_element, Props};
//!
//! let el = create_element(
//!     "div",
//!     Props::new().with("className", "a"),
//!     children!["hi", None::<&str>, 42],
//! );
//! assert_eq!(el.children().len(), 2);
//! assert_eq!(el.children()[0].text(), Some("hi"));
//! ```

use std::fmt;
use std::rc::Rc;

use super::component::Component;
use crate::types::Props;

// =============================================================================
// Tag
// =============================================================================

/// What an element (and the fiber built from it) stands for.
#[derive(Clone)]
pub enum Tag {
    /// Host node with the given tag name.
    Host(Rc<str>),
    /// Text node carrying only its string.
    Text(Rc<str>),
    /// Functional component producing children but no host node.
    Component(Component),
}

impl Tag {
    /// Whether a fiber of tag `self` can be reused for an element of tag `other`.
    ///
    /// Text always matches text (the content change is an update); components
    /// match by function identity.
    pub fn same_kind(&self, other: &Tag) -> bool {
        match (self, other) {
            (Tag::Host(a), Tag::Host(b)) => a == b,
            (Tag::Text(_), Tag::Text(_)) => true,
            (Tag::Component(a), Tag::Component(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Short label used in logs and error messages.
    pub fn label(&self) -> &str {
        match self {
            Tag::Host(name) => name,
            Tag::Text(_) => "#text",
            Tag::Component(component) => component.name(),
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tag::Text(a), Tag::Text(b)) => a == b,
            _ => self.same_kind(other),
        }
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Host(name) => write!(f, "Host({name})"),
            Tag::Text(text) => write!(f, "Text({text:?})"),
            Tag::Component(component) => write!(f, "Component({})", component.name()),
        }
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::Host(name.into())
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Tag::Host(name.into())
    }
}

impl From<Component> for Tag {
    fn from(component: Component) -> Self {
        Tag::Component(component)
    }
}

impl From<&Component> for Tag {
    fn from(component: &Component) -> Self {
        Tag::Component(component.clone())
    }
}

// =============================================================================
// Element
// =============================================================================

/// Immutable element descriptor.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    tag: Tag,
    props: Rc<Props>,
    children: Rc<[Element]>,
}

impl Element {
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Host children. Always empty for text and component elements.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Text content when this is a text element.
    pub fn text(&self) -> Option<&str> {
        match &self.tag {
            Tag::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self.tag, Tag::Component(_))
    }

    pub(crate) fn shared_props(&self) -> &Rc<Props> {
        &self.props
    }

    pub(crate) fn shared_children(&self) -> &Rc<[Element]> {
        &self.children
    }

    /// True when both handles point at the same description. An element that
    /// was not rebuilt cannot have changed.
    pub fn ptr_eq(&self, other: &Element) -> bool {
        self.tag == other.tag
            && Rc::ptr_eq(&self.props, &other.props)
            && Rc::ptr_eq(&self.children, &other.children)
    }
}

// =============================================================================
// Children
// =============================================================================

/// One entry of a child list before normalization.
#[derive(Clone, Debug)]
pub enum Child {
    Element(Element),
    Text(String),
    /// Nested list, flattened in place.
    List(Vec<Child>),
    /// Falsy slot, filtered out.
    Empty,
}

impl From<Element> for Child {
    fn from(element: Element) -> Self {
        Child::Element(element)
    }
}

impl From<&Element> for Child {
    fn from(element: &Element) -> Self {
        Child::Element(element.clone())
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.to_string())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

impl From<&String> for Child {
    fn from(text: &String) -> Self {
        Child::Text(text.clone())
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Child::Empty
    }
}

macro_rules! child_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(value: $ty) -> Self {
                    Child::Text(value.to_string())
                }
            }
        )*
    };
}

child_from_display!(i32, i64, u32, u64, usize, f64, char);

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Child::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(list: Vec<T>) -> Self {
        Child::List(list.into_iter().map(Into::into).collect())
    }
}

/// Build a heterogeneous child list.
///
/// ```
/// use spark_fiber::{children, Child};
///
/// let list: Vec<Child> = children!["a", 1, None::<String>];
/// assert_eq!(list.len(), 3);
/// ```
#[macro_export]
macro_rules! children {
    ($($child:expr),* $(,)?) => {
        vec![$($crate::primitives::Child::from($child)),*]
    };
}

fn normalize(children: impl IntoIterator<Item = Child>, out: &mut Vec<Element>) {
    for child in children {
        match child {
            Child::Element(element) => out.push(element),
            Child::Text(text) if text.is_empty() => {}
            Child::Text(text) => out.push(text_element(text)),
            Child::List(list) => normalize(list, out),
            Child::Empty => {}
        }
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Create an element.
///
/// Text children become text elements, falsy children are dropped and nested
/// lists are flattened. For a component tag the children are folded into the
/// reserved `children` prop instead of the element's own child list.
pub fn create_element(
    tag: impl Into<Tag>,
    props: impl Into<Option<Props>>,
    children: impl IntoIterator<Item = Child>,
) -> Element {
    let tag = tag.into();
    let mut props = props.into().unwrap_or_default();

    let mut normalized = Vec::new();
    normalize(children, &mut normalized);
    let normalized: Rc<[Element]> = normalized.into();

    let children = if matches!(tag, Tag::Component(_)) {
        props.set_children(normalized);
        Rc::from(Vec::new())
    } else {
        normalized
    };

    Element { tag, props: Rc::new(props), children }
}

/// Create a text element.
pub fn text_element(value: impl Into<String>) -> Element {
    let value: String = value.into();
    Element {
        tag: Tag::Text(value.into()),
        props: Rc::new(Props::default()),
        children: Rc::from(Vec::new()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::children;

    #[test]
    fn test_text_children_are_normalized() {
        let el = create_element("div", None, children!["hi"]);
        assert_eq!(el.children().len(), 1);
        assert_eq!(el.children()[0].text(), Some("hi"));
        assert!(el.children()[0].children().is_empty());
    }

    #[test]
    fn test_falsy_children_filtered() {
        let el = create_element(
            "ul",
            None,
            children![None::<Element>, false, "", "kept", Some("also")],
        );
        let texts: Vec<_> = el.children().iter().filter_map(Element::text).collect();
        assert_eq!(texts, vec!["kept", "also"]);
    }

    #[test]
    fn test_nested_lists_flatten() {
        let items: Vec<Element> = (0..3i32).map(|i| create_element("li", None, children![i])).collect();
        let el = create_element("ul", None, children!["head", items, "tail"]);
        let labels: Vec<_> = el.children().iter().map(|c| c.tag().label().to_string()).collect();
        assert_eq!(labels, vec!["#text", "li", "li", "li", "#text"]);
    }

    #[test]
    fn test_config_defaults_to_empty() {
        let el = create_element("div", None, Vec::new());
        assert!(el.props().is_empty());
        assert!(el.children().is_empty());
    }

    #[test]
    fn test_component_children_folded_into_props() {
        let component = Component::new("Wrapper", |props, _| props.children().first().cloned());
        let el = create_element(&component, Props::new().with("title", "x"), children!["inner"]);

        assert!(el.is_component());
        assert!(el.children().is_empty());
        assert_eq!(el.props().children().len(), 1);
        assert_eq!(el.props().children()[0].text(), Some("inner"));
        assert_eq!(el.props().get("title"), Some(&"x".into()));
    }

    #[test]
    fn test_tag_kinds() {
        let a = Component::new("A", |_, _| None);
        let b = Component::new("A", |_, _| None);

        assert!(Tag::from("div").same_kind(&Tag::from("div")));
        assert!(!Tag::from("div").same_kind(&Tag::from("span")));
        assert!(Tag::Text("x".into()).same_kind(&Tag::Text("y".into())));
        assert!(Tag::from(&a).same_kind(&Tag::from(a.clone())));
        assert!(!Tag::from(&a).same_kind(&Tag::from(&b)));
    }

    #[test]
    fn test_clone_is_same_element() {
        let el = create_element("div", None, children!["x"]);
        let rebuilt = create_element("div", None, children!["x"]);
        assert!(el.ptr_eq(&el.clone()));
        assert!(!el.ptr_eq(&rebuilt));
        assert_eq!(el, rebuilt);
    }
}
