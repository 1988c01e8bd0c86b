//! Host capabilities consumed by the engine.
//!
//! The engine never implements a host tree or an idle scheduler. It calls
//! into them through these traits:
//! - [`HostTree`] - node construction, property application, insertion/removal
//! - [`Schedule`] - "call me back when idle"
//! - [`Deadline`] - "has this slice used up its budget?"

use std::cell::Cell;
use std::fmt::Debug;
use std::time::{Duration, Instant};

use crate::error::HostError;
use crate::types::{EventHandler, PropValue};

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Host Tree
// =============================================================================

/// The mutable host structure the engine keeps in sync.
///
/// Only the commit phase inserts, removes or mutates attached nodes.
/// Construction (`create_*` plus eager property application on the fresh
/// node) happens while reconciling and touches nothing visible.
pub trait HostTree {
    /// Cheap handle to a host node.
    type Node: Clone + PartialEq + Debug;

    /// Whether `node` is a live node this host can mount into.
    fn contains(&self, node: &Self::Node) -> bool;

    fn create_element(&mut self, tag: &str) -> Result<Self::Node, HostError>;

    fn create_text(&mut self, text: &str) -> Result<Self::Node, HostError>;

    fn set_property(&mut self, node: &Self::Node, name: &str, value: &PropValue) -> Result<(), HostError>;

    fn remove_property(&mut self, node: &Self::Node, name: &str) -> Result<(), HostError>;

    fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), HostError>;

    fn add_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler) -> Result<(), HostError>;

    fn remove_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler) -> Result<(), HostError>;

    /// Insert `child` under `parent`, before `before` or at the end.
    fn insert_before(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        before: Option<&Self::Node>,
    ) -> Result<(), HostError>;

    /// Detach `node` from its parent.
    fn remove(&mut self, node: &Self::Node) -> Result<(), HostError>;

    /// A node built for an abandoned pass will never be inserted.
    fn release(&mut self, _node: &Self::Node) {}
}

// =============================================================================
// Scheduling
// =============================================================================

/// The host's "schedule continuation" primitive.
///
/// When called, the host arranges for the runtime's `work_loop` to run at its
/// next idle opportunity.
pub trait Schedule {
    fn request_callback(&self);
}

impl<F: Fn()> Schedule for F {
    fn request_callback(&self) {
        self()
    }
}

/// Per-slice budget supplied by the host.
pub trait Deadline {
    /// True once the slice has used up its budget.
    fn did_timeout(&self) -> bool;
}

/// Never times out; the loop runs until the tree is done.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn did_timeout(&self) -> bool {
        false
    }
}

/// Wall-clock budget.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    end: Instant,
}

impl TimeBudget {
    pub fn new(budget: Duration) -> Self {
        Self { end: Instant::now() + budget }
    }

    pub fn time_remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

impl Deadline for TimeBudget {
    fn did_timeout(&self) -> bool {
        Instant::now() >= self.end
    }
}

/// Deterministic budget: times out after `units` checks.
///
/// The work loop checks once per unit of work, so `UnitBudget::new(1)` yields
/// after every fiber.
#[derive(Debug)]
pub struct UnitBudget {
    remaining: Cell<usize>,
}

impl UnitBudget {
    pub fn new(units: usize) -> Self {
        Self { remaining: Cell::new(units) }
    }
}

impl Deadline for UnitBudget {
    fn did_timeout(&self) -> bool {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        remaining == 0
    }
}
