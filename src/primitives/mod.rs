//! Element Factory - Building blocks handed to the reconciler.
//!
//! - [`create_element`] - host, text and component elements
//! - [`Component`] - functional components rendered with hooks
//! - [`Child`] / [`children!`](crate::children) - child lists before normalization

mod component;
mod element;

pub use component::Component;
pub use element::{Child, Element, Tag, create_element, text_element};
