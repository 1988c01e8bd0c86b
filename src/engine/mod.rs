//! Fiber Engine - The persistent work tree.
//!
//! - Registry: generational slot allocation, structural walks
//! - Fiber: one node of the tree (description, host node, links, diff state)
//!
//! # Architecture
//!
//! Fibers are NOT pointers. They are handles into one arena:
//!
//! ```text
//! #root  (node=container, child=1)
//! div    (parent=0, child=2, effect=Update)
//! #text  (parent=1, sibling=None, effect=None)
//! ```
//!
//! Both the current and the work-in-progress tree live in the same arena.
//! `alternate` only ever points from work-in-progress to current, so the
//! links never form cycles.

mod fiber;
mod registry;

pub use fiber::{Fiber, FiberKind};
pub use registry::{Ancestors, Children, FiberId, FiberRegistry};
