//! Work Loop - Cooperative driver of the reconciliation pass.
//!
//! # State machine
//!
//! ```text
//!   Idle ──render / state update──▶ Reconciling ──cursor exhausted──▶ Committing ──▶ Idle
//!                                     │    ▲
//!                                     └────┘ deadline hit: yield, resume on next continuation
//! ```
//!
//! Each unit of work is one fiber: begin work on it, and if it has no child,
//! complete it and climb until a sibling turns up. The deadline is checked
//! between units only, never mid-fiber. All loop state (cursor,
//! work-in-progress root, deletion list) lives on [`Context`], so a yield
//! loses nothing.

use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::commit::CommitStats;
use crate::config::EngineConfig;
use crate::engine::{Fiber, FiberId, FiberRegistry};
use crate::error::{Error, Result};
use crate::host::{Deadline, HostTree, Schedule};
use crate::primitives::Element;
use crate::state::UpdateQueue;
use crate::types::{EffectTag, FiberFlags, Phase};

/// What one slice of the work loop ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOutcome {
    /// Nothing to do.
    Idle,
    /// Deadline hit with work remaining; a continuation was requested.
    Yielded,
    /// The pass finished and was committed.
    Committed,
}

// =============================================================================
// Context - Scheduler state
// =============================================================================

/// Engine state threaded through every operation.
///
/// Holds the host tree, the fiber arena with both roots, the cursor and the
/// deletion list. Independent instances never share anything.
pub struct Context<H: HostTree> {
    pub(crate) host: H,
    pub(crate) fibers: FiberRegistry<H::Node>,
    pub(crate) current_root: Option<FiberId>,
    pub(crate) wip_root: Option<FiberId>,
    pub(crate) next_unit: Option<FiberId>,
    pub(crate) deletions: Vec<FiberId>,
    pub(crate) phase: Phase,
    pub(crate) updates: Rc<UpdateQueue>,
    pub(crate) config: EngineConfig,
    pub(crate) units: usize,
    pub(crate) last_commit: Option<CommitStats>,
}

impl<H: HostTree> Context<H> {
    pub fn new(host: H, schedule: Rc<dyn Schedule>, config: EngineConfig) -> Self {
        Self {
            host,
            fibers: FiberRegistry::new(),
            current_root: None,
            wip_root: None,
            next_unit: None,
            deletions: Vec::new(),
            phase: Phase::Idle,
            updates: UpdateQueue::new(schedule),
            config,
            units: 0,
            last_commit: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fibers(&self) -> &FiberRegistry<H::Node> {
        &self.fibers
    }

    pub fn current_root(&self) -> Option<FiberId> {
        self.current_root
    }

    pub fn last_commit(&self) -> Option<&CommitStats> {
        self.last_commit.as_ref()
    }

    /// Whether a continuation has been requested and not yet run.
    pub fn is_scheduled(&self) -> bool {
        self.updates.is_requested()
    }

    /// Units of work performed by the pass in progress (or the last one).
    pub fn units_performed(&self) -> usize {
        self.units
    }

    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Begin a fresh top-level pass rendering `element` into `host_root`.
    ///
    /// A pass already in progress is abandoned. Nothing is reconciled here;
    /// the host is asked for a continuation.
    pub fn render(&mut self, element: Element, host_root: H::Node) -> Result<()> {
        if !self.host.contains(&host_root) {
            return Err(Error::Mount {
                reason: format!("host root {host_root:?} is not a live node"),
            });
        }

        if self.phase == Phase::Reconciling {
            self.abandon_pass("superseded by a new render");
        }

        let mut root = Fiber::root(host_root.clone(), Rc::from(vec![element]));

        if let Some(current) = self.current_root {
            let same_container = self.fibers.get(current).and_then(|f| f.node.as_ref()) == Some(&host_root);
            if same_container {
                root.alternate = Some(current);
            } else {
                // Moving to a new container: the old tree goes away entirely
                let old_children: Vec<FiberId> = self.fibers.children(current).collect();
                for child in old_children {
                    self.mark_deletion(child);
                }
            }
        }

        let root = self.fibers.allocate(root);
        self.start_pass(root);
        self.updates.request();
        debug!(root = ?root, "render requested");
        Ok(())
    }

    /// One slice of the work loop.
    pub fn work_loop(&mut self, deadline: &dyn Deadline) -> Result<SliceOutcome> {
        self.updates.acknowledge();

        if self.phase == Phase::Idle && !self.start_update_pass() {
            return Ok(SliceOutcome::Idle);
        }

        let mut slice_units = 0usize;
        while let Some(unit) = self.next_unit {
            match self.perform_unit_of_work(unit) {
                Ok(next) => self.next_unit = next,
                Err(error) => {
                    warn!(%error, "render pass aborted");
                    self.abandon_pass("render error");
                    return Err(error);
                }
            }
            self.units += 1;
            slice_units += 1;

            if self.next_unit.is_none() {
                break;
            }

            let capped = self
                .config
                .max_units_per_slice
                .is_some_and(|cap| slice_units >= cap.get());
            if capped || deadline.did_timeout() {
                trace!(slice_units, total = self.units, "yielding to host");
                self.updates.request();
                return Ok(SliceOutcome::Yielded);
            }
        }

        self.phase = Phase::Committing;
        let result = self.commit_root();
        self.phase = Phase::Idle;
        let stats = result?;
        debug!(?stats, units = self.units, "committed");
        self.last_commit = Some(stats);

        // Updates that arrived mid-pass get their own pass
        if self.updates.has_dirty() {
            self.updates.request();
        }

        Ok(SliceOutcome::Committed)
    }

    // =========================================================================
    // Pass Lifecycle
    // =========================================================================

    fn start_pass(&mut self, wip_root: FiberId) {
        self.mark_pending_updates();
        self.wip_root = Some(wip_root);
        self.next_unit = Some(wip_root);
        self.units = 0;
        self.phase = Phase::Reconciling;
    }

    /// Start a re-render of the committed tree if state updates are queued.
    fn start_update_pass(&mut self) -> bool {
        if !self.updates.has_dirty() {
            return false;
        }

        let Some(current) = self.current_root else {
            // Nothing mounted yet; the updates will be seen on first render
            return false;
        };
        let Some(current_fiber) = self.fibers.get(current) else {
            return false;
        };
        let Some(node) = current_fiber.node.clone() else {
            return false;
        };

        let mut root = Fiber::root(node, current_fiber.element_children.clone());
        root.alternate = Some(current);
        let root = self.fibers.allocate(root);

        debug!(root = ?root, "state update pass");
        self.start_pass(root);
        true
    }

    /// Flag owners of queued updates and every ancestor, so the walk reaches them.
    fn mark_pending_updates(&mut self) {
        for owner in self.updates.take_dirty() {
            let Some(fiber) = self.fibers.get_mut(owner) else { continue };
            fiber.flags.insert(FiberFlags::PENDING);

            let ancestors: Vec<FiberId> = self.fibers.ancestors(owner).collect();
            for ancestor in ancestors {
                if let Some(fiber) = self.fibers.get_mut(ancestor) {
                    if fiber.flags.contains(FiberFlags::SUBTREE_PENDING) {
                        break;
                    }
                    fiber.flags.insert(FiberFlags::SUBTREE_PENDING);
                }
            }
        }
    }

    /// Drop the work-in-progress tree without committing anything.
    pub(crate) fn abandon_pass(&mut self, reason: &str) {
        let Some(wip_root) = self.wip_root.take() else {
            self.next_unit = None;
            self.phase = Phase::Idle;
            return;
        };
        debug!(reason, units = self.units, "abandoning pass");

        for id in self.fibers.subtree(wip_root) {
            self.restore_adopted_children(id);
            let Some(fiber) = self.fibers.release(id) else { continue };
            if fiber.effect == EffectTag::Placement {
                if let Some(node) = &fiber.node {
                    self.host.release(node);
                }
            }
        }

        for id in std::mem::take(&mut self.deletions) {
            if let Some(fiber) = self.fibers.get_mut(id) {
                fiber.effect = EffectTag::None;
            }
        }

        self.next_unit = None;
        self.phase = Phase::Idle;
    }

    /// Hand adopted children back to the committed fiber they came from.
    fn restore_adopted_children(&mut self, id: FiberId) {
        let Some(fiber) = self.fibers.get(id) else { return };
        if !fiber.flags.contains(FiberFlags::ADOPTED_CHILDREN) {
            return;
        }
        let Some(alternate) = fiber.alternate else { return };

        let children: Vec<FiberId> = self.fibers.children(id).collect();
        for child in children {
            if let Some(child) = self.fibers.get_mut(child) {
                child.parent = Some(alternate);
            }
        }
        if let Some(alternate) = self.fibers.get_mut(alternate) {
            alternate.flags.remove(FiberFlags::ADOPTED_CHILDREN);
        }
    }

    // =========================================================================
    // Units of Work
    // =========================================================================

    /// Begin work on `unit`; if it has no child, complete it and its
    /// finished ancestors. Returns the next unit.
    fn perform_unit_of_work(&mut self, unit: FiberId) -> Result<Option<FiberId>> {
        trace!(fiber = ?unit, kind = self.fibers.get(unit).map(|f| f.kind.label()), "unit of work");

        if let Some(child) = self.begin_work(unit)? {
            return Ok(Some(child));
        }

        let mut fiber = unit;
        loop {
            self.complete_work(fiber)?;

            let Some(current) = self.fibers.get(fiber) else { return Ok(None) };
            if let Some(sibling) = current.sibling {
                return Ok(Some(sibling));
            }
            if Some(fiber) == self.wip_root {
                return Ok(None);
            }
            match current.parent {
                Some(parent) => fiber = parent,
                None => return Ok(None),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
