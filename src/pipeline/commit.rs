//! Commit - Applies a finished work-in-progress tree to the host.
//!
//! Runs without yielding, in three steps:
//!
//! 1. Deletions: detach every listener in each deleted subtree, then remove
//!    the topmost host nodes.
//! 2. Depth-first walk of the new tree: insert placements before the next
//!    committed host sibling, diff props for updates, then clear the fiber's
//!    effect and alternate and commit its hooks.
//! 3. Swap roots and free the old tree.
//!
//! A host error aborts the rest of the commit. Placements and property
//! writes that already reached the host are undone from a journal, so the
//! host matches the last fully committed tree again and the next render
//! reconciles against it. Deletions that completed are not restored.

use tracing::{debug, trace, warn};

use super::work_loop::Context;
use crate::engine::{FiberId, FiberKind};
use crate::error::{Error, HostError, Result};
use crate::host::HostTree;
use crate::types::{EffectTag, EventHandler, FiberFlags, PropValue, Props, event_name};

/// Counts from one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Host subtrees inserted into the attached tree.
    pub placements: usize,
    /// Fibers whose host node was mutated in place.
    pub updates: usize,
    /// Deleted subtrees.
    pub deletions: usize,
    /// Individual host calls made.
    pub host_calls: usize,
}

/// A host mutation that succeeded during the current commit.
enum Applied<N> {
    Inserted(N),
    PropertySet { node: N, name: String, previous: Option<PropValue> },
    PropertyRemoved { node: N, name: String, previous: PropValue },
    ListenerAdded { node: N, event: String, handler: EventHandler },
    ListenerRemoved { node: N, event: String, handler: EventHandler },
    TextSet { node: N, previous: String },
}

type Journal<N> = Vec<Applied<N>>;

impl<H: HostTree> Context<H> {
    pub(crate) fn commit_root(&mut self) -> Result<CommitStats> {
        let Some(wip_root) = self.wip_root else {
            return Ok(CommitStats::default());
        };
        let mut stats = CommitStats::default();
        let mut journal = Vec::new();

        if let Err(error) = self.commit_mutations(wip_root, &mut stats, &mut journal) {
            warn!(%error, ?stats, "commit aborted, undoing applied mutations");
            self.roll_back(journal);
            self.abandon_pass("commit failed");
            return Err(error);
        }

        let old_root = self.current_root.replace(wip_root);
        self.wip_root = None;
        self.next_unit = None;

        for id in self.fibers.subtree(wip_root) {
            let Some(fiber) = self.fibers.get_mut(id) else { continue };
            fiber.effect = EffectTag::None;
            fiber.alternate = None;
            fiber.flags.remove(FiberFlags::ADOPTED_CHILDREN | FiberFlags::WORK);
            for hook in &mut fiber.hooks {
                hook.commit(id);
            }
        }

        if let Some(old_root) = old_root {
            let old = self.fibers.subtree(old_root);
            trace!(freed = old.len(), "sweeping previous tree");
            for id in old {
                self.fibers.release(id);
            }
        }

        // Deleted fibers were part of the old tree and are gone with it
        self.deletions.clear();

        Ok(stats)
    }

    fn commit_mutations(
        &mut self,
        wip_root: FiberId,
        stats: &mut CommitStats,
        journal: &mut Journal<H::Node>,
    ) -> Result<()> {
        for index in 0..self.deletions.len() {
            let id = self.deletions[index];
            self.commit_deletion(id, stats)?;
            stats.deletions += 1;
        }

        for id in self.fibers.subtree(wip_root) {
            let Some(fiber) = self.fibers.get(id) else { continue };
            match fiber.effect {
                EffectTag::Placement => self.commit_placement(id, stats, journal)?,
                EffectTag::Update => self.commit_update(id, stats, journal)?,
                EffectTag::None | EffectTag::Deletion => {}
            }
        }

        debug!(?stats, "mutations applied");
        Ok(())
    }

    /// Undo journaled mutations, newest first.
    ///
    /// Keeps going past failures; a host that rejects the inverse of a call
    /// it just accepted is left as it is.
    fn roll_back(&mut self, journal: Journal<H::Node>) {
        let total = journal.len();
        let mut failed = 0;

        for applied in journal.into_iter().rev() {
            let result: std::result::Result<(), HostError> = match &applied {
                Applied::Inserted(node) => self.host.remove(node),
                Applied::PropertySet { node, name, previous: Some(value) } => {
                    self.host.set_property(node, name, value)
                }
                Applied::PropertySet { node, name, previous: None } => self.host.remove_property(node, name),
                Applied::PropertyRemoved { node, name, previous } => self.host.set_property(node, name, previous),
                Applied::ListenerAdded { node, event, handler } => self.host.remove_listener(node, event, handler),
                Applied::ListenerRemoved { node, event, handler } => self.host.add_listener(node, event, handler),
                Applied::TextSet { node, previous } => self.host.set_text(node, previous),
            };
            if let Err(error) = result {
                failed += 1;
                warn!(%error, "could not undo host mutation");
            }
        }

        debug!(undone = total - failed, failed, "partial commit rolled back");
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    fn commit_deletion(&mut self, id: FiberId, stats: &mut CommitStats) -> Result<()> {
        let subtree = self.fibers.subtree(id);

        // Listeners first, so nothing removed can still fire
        for &fiber_id in &subtree {
            let Some(fiber) = self.fibers.get(fiber_id) else { continue };
            if fiber.flags.contains(FiberFlags::DETACHED) {
                continue;
            }
            if let Some(node) = fiber.node.clone() {
                let props = fiber.props.clone();
                for (key, value) in props.iter() {
                    if let PropValue::Handler(handler) = value {
                        self.host
                            .remove_listener(&node, &event_name(key), handler)
                            .map_err(Error::host("remove_listener"))?;
                        stats.host_calls += 1;
                    }
                }
            }
            if let Some(fiber) = self.fibers.get_mut(fiber_id) {
                fiber.flags.insert(FiberFlags::DETACHED);
            }
        }

        for top in self.host_roots(id) {
            let Some(node) = self.fibers.get(top).and_then(|f| f.node.clone()) else { continue };
            self.host.remove(&node).map_err(Error::host("remove"))?;
            stats.host_calls += 1;

            for below in self.fibers.subtree(top) {
                if let Some(fiber) = self.fibers.get_mut(below) {
                    fiber.node = None;
                }
            }
        }

        trace!(fiber = ?id, fibers = subtree.len(), "deleted");
        Ok(())
    }

    /// Topmost fibers with a host node in the subtree of `id`.
    ///
    /// Removing these detaches everything below them; a component fiber has
    /// no node of its own so the search continues through it.
    fn host_roots(&self, id: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            let Some(fiber) = self.fibers.get(current) else { continue };
            if fiber.node.is_some() {
                out.push(current);
                continue;
            }
            let start = stack.len();
            stack.extend(self.fibers.children(current));
            stack[start..].reverse();
        }

        out
    }

    // =========================================================================
    // Placement
    // =========================================================================

    fn commit_placement(
        &mut self,
        id: FiberId,
        stats: &mut CommitStats,
        journal: &mut Journal<H::Node>,
    ) -> Result<()> {
        let Some(node) = self.fibers.get(id).and_then(|f| f.node.clone()) else {
            // Components place nothing themselves; their host descendants do
            return Ok(());
        };
        let Some((parent_fiber, parent)) = self.host_parent(id) else {
            return Err(Error::Mount {
                reason: format!("fiber {id:?} has no host ancestor"),
            });
        };
        let before = self.host_sibling(id);

        self.host
            .insert_before(&parent, &node, before.as_ref())
            .map_err(Error::host("insert_before"))?;
        stats.host_calls += 1;
        journal.push(Applied::Inserted(node));

        // Nodes filling a parent placed in this same commit belong to its placement
        let nested = self.fibers.get(parent_fiber).is_some_and(|f| f.effect == EffectTag::Placement);
        if !nested {
            stats.placements += 1;
        }
        Ok(())
    }

    /// Nearest ancestor that has a host node, with that node.
    fn host_parent(&self, id: FiberId) -> Option<(FiberId, H::Node)> {
        self.fibers.ancestors(id).find_map(|ancestor| {
            let node = self.fibers.get(ancestor)?.node.clone()?;
            Some((ancestor, node))
        })
    }

    /// First already-committed host node after `id` under the same host parent.
    ///
    /// Walks forward through siblings, descending into component fibers and
    /// climbing out of them when their children run out. Subtrees being
    /// placed in this commit are skipped; they are not attached yet.
    fn host_sibling(&self, id: FiberId) -> Option<H::Node> {
        let mut current = id;

        'siblings: loop {
            // Find the next sibling, climbing out of node-less ancestors
            loop {
                let fiber = self.fibers.get(current)?;
                if let Some(sibling) = fiber.sibling {
                    current = sibling;
                    break;
                }
                let parent = fiber.parent?;
                if self.fibers.get(parent)?.node.is_some() {
                    return None;
                }
                current = parent;
            }

            // Descend to the first host fiber of that sibling
            loop {
                let fiber = self.fibers.get(current)?;
                if fiber.effect == EffectTag::Placement {
                    continue 'siblings;
                }
                if let Some(node) = &fiber.node {
                    return Some(node.clone());
                }
                match fiber.child {
                    Some(child) => current = child,
                    None => continue 'siblings,
                }
            }
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    fn commit_update(&mut self, id: FiberId, stats: &mut CommitStats, journal: &mut Journal<H::Node>) -> Result<()> {
        let Some(fiber) = self.fibers.get(id) else { return Ok(()) };
        let Some(node) = fiber.node.clone() else { return Ok(()) };
        let Some(alternate) = fiber.alternate.and_then(|alt| self.fibers.get(alt)) else {
            return Ok(());
        };

        let text = match (&fiber.kind, &alternate.kind) {
            (FiberKind::Text(next), FiberKind::Text(prev)) if next != prev => Some((next.clone(), prev.clone())),
            _ => None,
        };
        let is_host = matches!(fiber.kind, FiberKind::Host(_));
        let next = fiber.props.clone();
        let prev = alternate.props.clone();

        let calls = if let Some((text, previous)) = text {
            self.host.set_text(&node, &text).map_err(Error::host("set_text"))?;
            journal.push(Applied::TextSet { node, previous: previous.to_string() });
            1
        } else if is_host {
            self.update_properties(&node, &prev, &next, journal)?
        } else {
            0
        };

        if calls > 0 {
            stats.updates += 1;
            stats.host_calls += calls;
        }
        Ok(())
    }

    /// Diff two prop maps onto `node`. Returns the number of host calls made.
    fn update_properties(
        &mut self,
        node: &H::Node,
        prev: &Props,
        next: &Props,
        journal: &mut Journal<H::Node>,
    ) -> Result<usize> {
        let mut calls = 0;

        // Removed (or nulled) entries
        for (key, old) in prev.iter() {
            if !next.get(key).is_none_or(PropValue::is_null) {
                continue;
            }
            match old {
                PropValue::Null => continue,
                PropValue::Handler(handler) => self.detach_listener(node, key, handler, journal)?,
                _ => {
                    self.host
                        .remove_property(node, key)
                        .map_err(Error::host("remove_property"))?;
                    journal.push(Applied::PropertyRemoved {
                        node: node.clone(),
                        name: key.to_string(),
                        previous: old.clone(),
                    });
                }
            }
            calls += 1;
        }

        // Added or changed entries
        for (key, value) in next.iter() {
            if value.is_null() {
                continue;
            }
            let old = prev.get(key);
            if old == Some(value) && !self.config.is_controlled(key) {
                continue;
            }

            if let Some(PropValue::Handler(previous)) = old {
                self.detach_listener(node, key, previous, journal)?;
                calls += 1;
            }
            match value {
                PropValue::Handler(handler) => {
                    let event = event_name(key);
                    self.host
                        .add_listener(node, &event, handler)
                        .map_err(Error::host("add_listener"))?;
                    journal.push(Applied::ListenerAdded { node: node.clone(), event, handler: handler.clone() });
                }
                _ => {
                    self.host
                        .set_property(node, key, value)
                        .map_err(Error::host("set_property"))?;
                    let previous = old.filter(|old| !old.is_null() && !matches!(old, PropValue::Handler(_)));
                    journal.push(Applied::PropertySet {
                        node: node.clone(),
                        name: key.to_string(),
                        previous: previous.cloned(),
                    });
                }
            }
            calls += 1;
        }

        Ok(calls)
    }

    fn detach_listener(
        &mut self,
        node: &H::Node,
        key: &str,
        handler: &EventHandler,
        journal: &mut Journal<H::Node>,
    ) -> Result<()> {
        let event = event_name(key);
        self.host
            .remove_listener(node, &event, handler)
            .map_err(Error::host("remove_listener"))?;
        journal.push(Applied::ListenerRemoved { node: node.clone(), event, handler: handler.clone() });
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::children;
    use crate::config::EngineConfig;
    use crate::host::Unbounded;
    use crate::host::testing::{Op, RecordingHost};
    use crate::primitives::{Child, Component, Element, create_element};

    fn context() -> Context<RecordingHost> {
        Context::new(RecordingHost::new(), Rc::new(|| {}), EngineConfig::default())
    }

    fn commit(cx: &mut Context<RecordingHost>, element: Element) -> CommitStats {
        let root = cx.host().root();
        cx.render(element, root).unwrap();
        cx.work_loop(&Unbounded).unwrap();
        *cx.last_commit().unwrap()
    }

    fn item(label: &str) -> Element {
        create_element("li", None, children![label])
    }

    #[test]
    fn test_single_property_change_is_one_call() {
        let mut cx = context();
        commit(&mut cx, create_element("div", Props::new().with("className", "a"), Vec::new()));
        cx.host_mut().take_ops();

        let stats = commit(&mut cx, create_element("div", Props::new().with("className", "b"), Vec::new()));

        let div = cx.host().find("div").unwrap();
        assert_eq!(cx.host().ops.as_slice(), &[Op::SetProperty(div, "className".into())]);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.host_calls, 1);
        assert_eq!(cx.host().html(), "<div className=\"b\"></div>");
    }

    #[test]
    fn test_removed_and_nulled_properties() {
        let mut cx = context();
        commit(
            &mut cx,
            create_element("div", Props::new().with("title", "t").with("id", "x"), Vec::new()),
        );
        cx.host_mut().take_ops();

        commit(&mut cx, create_element("div", Props::new().with("title", None::<&str>), Vec::new()));

        let div = cx.host().find("div").unwrap();
        assert_eq!(
            cx.host().ops.as_slice(),
            &[
                Op::RemoveProperty(div, "title".into()),
                Op::RemoveProperty(div, "id".into()),
            ]
        );
        assert_eq!(cx.host().html(), "<div></div>");
    }

    #[test]
    fn test_handler_is_rebound() {
        let mut cx = context();
        commit(&mut cx, create_element("button", Props::new().on("onClick", |_| {}), Vec::new()));
        cx.host_mut().take_ops();

        commit(&mut cx, create_element("button", Props::new().on("onClick", |_| {}), Vec::new()));

        let button = cx.host().find("button").unwrap();
        assert_eq!(
            cx.host().ops.as_slice(),
            &[
                Op::RemoveListener(button, "click".into()),
                Op::AddListener(button, "click".into()),
            ]
        );
        assert_eq!(cx.host().listener_count(button), 1);
    }

    #[test]
    fn test_text_update() {
        let mut cx = context();
        commit(&mut cx, create_element("p", None, children!["one"]));
        cx.host_mut().take_ops();

        commit(&mut cx, create_element("p", None, children!["two"]));

        assert_eq!(cx.host().mutations().len(), 1);
        assert!(matches!(cx.host().ops[0], Op::SetText(_, ref text) if text == "two"));
        assert_eq!(cx.host().html(), "<p>two</p>");
    }

    #[test]
    fn test_controlled_property_always_written() {
        let mut cx = Context::new(
            RecordingHost::new(),
            Rc::new(|| {}),
            EngineConfig::new().with_controlled_property("value"),
        );
        let input = || create_element("input", Props::new().with("value", "x").with("type", "text"), Vec::new());
        commit(&mut cx, input());
        cx.host_mut().take_ops();

        commit(&mut cx, input());

        let node = cx.host().find("input").unwrap();
        assert_eq!(cx.host().ops.as_slice(), &[Op::SetProperty(node, "value".into())]);
    }

    #[test]
    fn test_replaced_middle_child_keeps_position() {
        let mut cx = context();
        commit(&mut cx, create_element("ul", None, children![item("a"), item("b"), item("c")]));

        commit(
            &mut cx,
            create_element(
                "ul",
                None,
                children![item("a"), create_element("p", None, children!["x"]), item("c")],
            ),
        );

        assert_eq!(cx.host().html(), "<ul><li>a</li><p>x</p><li>c</li></ul>");
    }

    #[test]
    fn test_component_placement_finds_host_sibling() {
        let wrapper = Component::new("Wrapper", |props, _| props.children().first().cloned());
        let mut cx = context();
        commit(
            &mut cx,
            create_element("div", None, children![create_element("a", None, Vec::new()), create_element("c", None, Vec::new())]),
        );

        commit(
            &mut cx,
            create_element(
                "div",
                None,
                children![
                    create_element(&wrapper, None, children![create_element("b", None, Vec::new())]),
                    create_element("c", None, Vec::new())
                ],
            ),
        );

        assert_eq!(cx.host().html(), "<div><b></b><c></c></div>");
    }

    #[test]
    fn test_deletion_detaches_every_listener() {
        let mut cx = context();
        let tree = create_element(
            "div",
            Props::new().on("onClick", |_| {}),
            children![create_element("button", Props::new().on("onClick", |_| {}).on("onKeyDown", |_| {}), Vec::new())],
        );
        commit(&mut cx, create_element("main", None, children![tree]));
        let div = cx.host().find("div").unwrap();
        let button = cx.host().find("button").unwrap();
        cx.host_mut().take_ops();

        let stats = commit(&mut cx, create_element("main", None, Vec::new()));

        assert_eq!(stats.deletions, 1);
        assert_eq!(cx.host().listener_count(div), 0);
        assert_eq!(cx.host().listener_count(button), 0);
        let removes: Vec<&Op> = cx.host().ops.iter().filter(|op| matches!(op, Op::Remove(_))).collect();
        assert_eq!(removes, vec![&Op::Remove(div)], "only the topmost node is removed");
        assert_eq!(cx.host().html(), "<main></main>");
    }

    #[test]
    fn test_component_deletion_removes_its_host_children() {
        let pair = Component::new("Pair", |_, _| {
            Some(create_element("span", None, children!["x"]))
        });
        let mut cx = context();
        commit(&mut cx, create_element("div", None, children![create_element(&pair, None, Vec::new())]));
        assert_eq!(cx.host().html(), "<div><span>x</span></div>");

        commit(&mut cx, create_element("div", None, Vec::new()));
        assert_eq!(cx.host().html(), "<div></div>");
    }

    #[test]
    fn test_old_tree_is_freed() {
        let mut cx = context();
        commit(&mut cx, create_element("ul", None, children![item("a"), item("b")]));
        let live = cx.fibers().len();

        commit(&mut cx, create_element("ul", None, children![item("a"), item("b")]));
        assert_eq!(cx.fibers().len(), live);

        commit(&mut cx, create_element("ul", None, children![item("a")]));
        assert_eq!(cx.fibers().len(), live - 2);
    }

    #[test]
    fn test_host_error_aborts_commit() {
        let mut cx = context();
        commit(&mut cx, create_element("div", Props::new().with("a", 1), Vec::new()));
        let committed = cx.current_root();

        cx.host_mut().reject_property = Some("a".into());
        let root = cx.host().root();
        cx.render(create_element("div", Props::new().with("a", 2), Vec::new()), root)
            .unwrap();
        let err = cx.work_loop(&Unbounded).unwrap_err();

        assert!(matches!(err, Error::HostMutation { operation: "set_property", .. }));
        assert!(!err.is_structural());
        assert_eq!(cx.current_root(), committed);

        // Recovery is a fresh render once the host accepts the value again
        cx.host_mut().reject_property = None;
        commit(&mut cx, create_element("div", Props::new().with("a", 3), Vec::new()));
        assert_eq!(cx.host().html(), "<div a=\"3\"></div>");
    }

    #[test]
    fn test_failed_commit_removes_landed_placements() {
        let tree = |items: Vec<Child>, a: i64| {
            create_element(
                "div",
                None,
                children![
                    create_element("ul", None, items),
                    create_element("p", Props::new().with("a", a), Vec::new())
                ],
            )
        };
        let mut cx = context();
        commit(&mut cx, tree(Vec::new(), 1));

        cx.host_mut().reject_property = Some("a".into());
        let root = cx.host().root();
        cx.host_mut().take_ops();
        cx.render(tree(children![create_element("li", None, Vec::new())], 2), root).unwrap();
        cx.work_loop(&Unbounded).unwrap_err();

        let li = cx
            .host()
            .ops
            .iter()
            .find_map(|op| match op {
                Op::Insert { child, .. } => Some(*child),
                _ => None,
            })
            .unwrap();
        assert!(cx.host().ops.contains(&Op::Remove(li)));
        assert!(cx.host().ops.contains(&Op::Release(li)));
        assert_eq!(cx.host().html(), "<div><ul></ul><p a=\"1\"></p></div>");

        cx.host_mut().reject_property = None;
        commit(&mut cx, tree(children![create_element("li", None, Vec::new())], 3));
        assert_eq!(cx.host().html(), "<div><ul><li></li></ul><p a=\"3\"></p></div>");
    }

    #[test]
    fn test_failed_commit_restores_applied_properties() {
        let tree = |class: &str, a: i64| {
            create_element(
                "div",
                None,
                children![
                    create_element("span", Props::new().with("className", class), Vec::new()),
                    create_element("p", Props::new().with("a", a), Vec::new())
                ],
            )
        };
        let mut cx = context();
        commit(&mut cx, tree("a", 1));

        cx.host_mut().reject_property = Some("a".into());
        let root = cx.host().root();
        cx.render(tree("b", 2), root).unwrap();
        cx.work_loop(&Unbounded).unwrap_err();
        assert_eq!(cx.host().html(), "<div><span className=\"a\"></span><p a=\"1\"></p></div>");

        cx.host_mut().reject_property = None;
        commit(&mut cx, tree("a", 3));
        assert_eq!(cx.host().html(), "<div><span className=\"a\"></span><p a=\"3\"></p></div>");
    }
}
