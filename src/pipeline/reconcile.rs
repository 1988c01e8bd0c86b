//! Reconciler - Builds the work-in-progress tree one fiber at a time.
//!
//! `begin_work` produces a fiber's children (host/root fibers from their
//! element list, components by calling them) and diffs them positionally
//! against the alternate's children:
//!
//! - same kind at the same index: reuse the host node, mark `Update`
//! - different kind or new index: fresh fiber, mark `Placement`
//! - leftover or displaced old fibers: mark `Deletion` and queue them
//!
//! `complete_work` runs once all of a fiber's children are done and builds
//! the detached host node for placements. Nothing here touches an attached
//! node.

use std::rc::Rc;

use tracing::trace;

use super::work_loop::Context;
use crate::engine::{Fiber, FiberId, FiberKind};
use crate::error::{Error, Result};
use crate::host::HostTree;
use crate::primitives::{Component, Element};
use crate::state::{Hook, Hooks};
use crate::types::{EffectTag, FiberFlags, PropValue, Props, event_name};

impl<H: HostTree> Context<H> {
    // =========================================================================
    // Begin Work
    // =========================================================================

    /// Reconcile the children of `id`. Returns its first child, if any.
    pub(crate) fn begin_work(&mut self, id: FiberId) -> Result<Option<FiberId>> {
        let Some(fiber) = self.fibers.get(id) else {
            return Ok(None);
        };

        if self.config.reuse_unchanged_subtrees && self.can_bail_out(id) {
            self.adopt_children(id);
            return Ok(None);
        }

        let children = match &fiber.kind {
            FiberKind::Root | FiberKind::Host(_) => fiber.element_children.clone(),
            FiberKind::Text(_) => return Ok(None),
            FiberKind::Component(component) => {
                let component = component.clone();
                self.render_component(id, &component)?
            }
        };

        self.reconcile_children(id, &children);
        Ok(self.fibers.get(id).and_then(|f| f.child))
    }

    /// Run a component with its hook cursor and store the new hook list.
    fn render_component(&mut self, id: FiberId, component: &Component) -> Result<Rc<[Element]>> {
        let Some(fiber) = self.fibers.get(id) else {
            return Ok(Rc::from(Vec::new()));
        };
        let props = fiber.props.clone();
        let previous: Vec<Hook> = fiber
            .alternate
            .and_then(|alt| self.fibers.get(alt))
            .map(|alt| alt.hooks.clone())
            .unwrap_or_default();
        let mounting = fiber.alternate.is_none();

        let mut hooks = Hooks::new(id, component.name(), &previous, mounting, &self.updates);
        let output = component.render(&props, &mut hooks);
        let next = hooks.finish()?;

        trace!(component = component.name(), hooks = next.len(), "rendered");
        if let Some(fiber) = self.fibers.get_mut(id) {
            fiber.hooks = next;
        }

        Ok(output.into_iter().collect())
    }

    /// A reused fiber whose element was not rebuilt and whose subtree has no
    /// queued updates can keep its committed children as they are.
    fn can_bail_out(&self, id: FiberId) -> bool {
        let Some(fiber) = self.fibers.get(id) else { return false };
        if fiber.effect == EffectTag::Placement {
            return false;
        }
        let Some(alternate) = fiber.alternate.and_then(|alt| self.fibers.get(alt)) else {
            return false;
        };

        !alternate.flags.intersects(FiberFlags::WORK) && fiber.same_input(alternate)
    }

    /// Point the committed children at `id` instead of reconciling them.
    fn adopt_children(&mut self, id: FiberId) {
        let Some(alternate) = self.fibers.get(id).and_then(|f| f.alternate) else { return };
        let Some(alt) = self.fibers.get(alternate) else { return };
        let first_child = alt.child;
        let hooks = alt.hooks.clone();

        let children: Vec<FiberId> = self.fibers.children(alternate).collect();
        for child in &children {
            if let Some(child) = self.fibers.get_mut(*child) {
                child.parent = Some(id);
            }
        }

        if let Some(alt) = self.fibers.get_mut(alternate) {
            alt.flags.insert(FiberFlags::ADOPTED_CHILDREN);
        }
        if let Some(fiber) = self.fibers.get_mut(id) {
            fiber.child = first_child;
            fiber.hooks = hooks;
            fiber.flags.insert(FiberFlags::ADOPTED_CHILDREN);
        }

        trace!(fiber = ?id, adopted = children.len(), "subtree unchanged, reused");
    }

    // =========================================================================
    // Child Diff
    // =========================================================================

    /// Diff `elements` against the alternate's children by index.
    fn reconcile_children(&mut self, parent: FiberId, elements: &[Element]) {
        let mut old = self
            .fibers
            .get(parent)
            .and_then(|f| f.alternate)
            .and_then(|alt| self.fibers.get(alt))
            .and_then(|alt| alt.child);
        let mut previous: Option<FiberId> = None;

        for element in elements {
            let reusable = old.and_then(|o| self.fibers.get(o)).is_some_and(|o| {
                o.kind.matches(element.tag()) && !o.flags.contains(FiberFlags::DETACHED)
            });

            let mut fiber = Fiber::from_element(element, Some(parent));
            if reusable {
                if let Some(o) = old.and_then(|o| self.fibers.get(o)) {
                    fiber.node = o.node.clone();
                }
                fiber.alternate = old;
                fiber.effect = EffectTag::Update;
            } else {
                fiber.effect = EffectTag::Placement;
                if let Some(o) = old {
                    self.mark_deletion(o);
                }
            }

            let id = self.fibers.allocate(fiber);
            match previous.and_then(|p| self.fibers.get_mut(p)) {
                Some(prev) => prev.sibling = Some(id),
                None => {
                    if let Some(parent) = self.fibers.get_mut(parent) {
                        parent.child = Some(id);
                    }
                }
            }
            previous = Some(id);
            old = old.and_then(|o| self.fibers.get(o)).and_then(|o| o.sibling);
        }

        while let Some(o) = old {
            self.mark_deletion(o);
            old = self.fibers.get(o).and_then(|o| o.sibling);
        }
    }

    /// Queue a committed fiber (and implicitly its subtree) for removal.
    pub(crate) fn mark_deletion(&mut self, id: FiberId) {
        let Some(fiber) = self.fibers.get_mut(id) else { return };
        if fiber.effect == EffectTag::Deletion {
            return;
        }
        fiber.effect = EffectTag::Deletion;
        trace!(fiber = ?id, kind = fiber.kind.label(), "marked for deletion");
        self.deletions.push(id);
    }

    // =========================================================================
    // Complete Work
    // =========================================================================

    /// Build the detached host node for a placed host or text fiber.
    pub(crate) fn complete_work(&mut self, id: FiberId) -> Result<()> {
        let Some(fiber) = self.fibers.get(id) else { return Ok(()) };
        if fiber.effect != EffectTag::Placement || fiber.node.is_some() {
            return Ok(());
        }

        let node = match &fiber.kind {
            FiberKind::Host(tag) => {
                let props = fiber.props.clone();
                let node = self.host.create_element(tag).map_err(Error::host("create_element"))?;
                if let Err(error) = self.apply_initial_props(&node, &props) {
                    self.host.release(&node);
                    return Err(error);
                }
                node
            }
            FiberKind::Text(text) => self.host.create_text(text).map_err(Error::host("create_text"))?,
            FiberKind::Root | FiberKind::Component(_) => return Ok(()),
        };

        if let Some(fiber) = self.fibers.get_mut(id) {
            fiber.node = Some(node);
        }
        Ok(())
    }

    /// Apply every non-null prop to a fresh node: handlers as listeners,
    /// everything else as properties.
    fn apply_initial_props(&mut self, node: &H::Node, props: &Props) -> Result<()> {
        for (key, value) in props.iter() {
            match value {
                PropValue::Null => {}
                PropValue::Handler(handler) => self
                    .host
                    .add_listener(node, &event_name(key), handler)
                    .map_err(Error::host("add_listener"))?,
                _ => self
                    .host
                    .set_property(node, key, value)
                    .map_err(Error::host("set_property"))?,
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
