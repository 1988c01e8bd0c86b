//! Hook Engine - Ordered local-state slots for functional components.
//!
//! Slots are matched by position: the Nth `use_state` call of a render reads
//! the Nth slot of the previous render of the same fiber. Calling it a
//! different number of times, or with a different value type, is a
//! [`HookError`].
//!
//! # Update flow
//!
//! 1. `SetState::set` pushes onto the slot's queue, records the slot as
//!    dirty and requests a continuation from the host. Nothing else.
//! 2. The next pass marks the slot's owning fiber and its ancestors, so the
//!    walk reaches it.
//! 3. Rendering the fiber folds the queue (FIFO) over the committed value
//!    without consuming it.
//! 4. Commit consumes exactly the updates that render saw. An abandoned
//!    pass consumes nothing.
//!
//! # Example
//!
//! ```
//! use spark_fiber::{children, create_element, Component};
//!
//! let counter = Component::new("Counter", |_, hooks| {
//!     let (count, set_count) = hooks.use_state(0);
//!     let (label, _) = hooks.use_state(String::from("clicks"));
//!     let on_click = move |_: &spark_fiber::Event| set_count.update(|n| n + 1);
//!     Some(create_element(
//!         "button",
//!         spark_fiber::Props::new().on("onClick", on_click),
//!         children![format!("{label}: {count}")],
//!     ))
//! });
//! # let _ = counter;
//! ```

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::engine::FiberId;
use crate::error::HookError;
use crate::host::Schedule;

// =============================================================================
// Update Queue - Dirty slots and scheduling requests
// =============================================================================

/// Shared between the engine and every setter it hands out.
pub(crate) struct UpdateQueue {
    dirty: RefCell<Vec<Weak<dyn HookSlot>>>,
    requested: Cell<bool>,
    schedule: Rc<dyn Schedule>,
}

impl UpdateQueue {
    pub(crate) fn new(schedule: Rc<dyn Schedule>) -> Rc<Self> {
        Rc::new(Self {
            dirty: RefCell::new(Vec::new()),
            requested: Cell::new(false),
            schedule,
        })
    }

    /// Ask the host for a continuation unless one is already outstanding.
    pub(crate) fn request(&self) {
        if !self.requested.replace(true) {
            self.schedule.request_callback();
        }
    }

    /// Called when the host runs the continuation.
    pub(crate) fn acknowledge(&self) {
        self.requested.set(false);
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.requested.get()
    }

    fn mark(&self, slot: Weak<dyn HookSlot>) {
        self.dirty.borrow_mut().push(slot);
    }

    pub(crate) fn has_dirty(&self) -> bool {
        self.dirty
            .borrow()
            .iter()
            .any(|slot| slot.upgrade().is_some_and(|slot| slot.pending() > 0))
    }

    /// Owners of dirty slots that still have queued updates.
    pub(crate) fn take_dirty(&self) -> Vec<FiberId> {
        self.dirty
            .borrow_mut()
            .drain(..)
            .filter_map(|slot| slot.upgrade())
            .filter(|slot| slot.pending() > 0)
            .map(|slot| slot.owner())
            .collect()
    }
}

// =============================================================================
// Slots
// =============================================================================

pub(crate) trait HookSlot {
    fn owner(&self) -> FiberId;
    fn set_owner(&self, owner: FiberId);
    fn pending(&self) -> usize;
    /// Drop the `count` oldest queued updates.
    fn consume(&self, count: usize);
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

enum Update<T> {
    Replace(T),
    Apply(Rc<dyn Fn(&T) -> T>),
}

struct StateSlot<T> {
    owner: Cell<FiberId>,
    queue: RefCell<VecDeque<Update<T>>>,
    updates: Weak<UpdateQueue>,
}

impl<T: Clone + 'static> StateSlot<T> {
    /// Fold the queue over `base`. Returns the value and how many updates it saw.
    fn resolve(&self, base: &T) -> (T, usize) {
        let queue = self.queue.borrow();
        let mut value = base.clone();
        for update in queue.iter() {
            value = match update {
                Update::Replace(next) => next.clone(),
                Update::Apply(f) => f(&value),
            };
        }
        (value, queue.len())
    }
}

impl<T: 'static> HookSlot for StateSlot<T> {
    fn owner(&self) -> FiberId {
        self.owner.get()
    }

    fn set_owner(&self, owner: FiberId) {
        self.owner.set(owner);
    }

    fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn consume(&self, count: usize) {
        let mut queue = self.queue.borrow_mut();
        let count = count.min(queue.len());
        queue.drain(..count);
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

// =============================================================================
// Hook - Per-fiber record
// =============================================================================

/// One slot as seen by one fiber: the shared queue plus the value this
/// fiber rendered with.
#[derive(Clone)]
pub struct Hook {
    slot: Rc<dyn HookSlot>,
    value: Rc<dyn Any>,
    consumed: usize,
}

impl Hook {
    fn typed<T: 'static>(&self) -> Option<(Rc<StateSlot<T>>, &T)> {
        let value = self.value.downcast_ref::<T>()?;
        let slot = self.slot.clone().into_any().downcast::<StateSlot<T>>().ok()?;
        Some((slot, value))
    }

    /// Value of this slot as committed, if it holds a `T`.
    pub fn value<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn pending(&self) -> usize {
        self.slot.pending()
    }

    /// Make this record the committed one: consume what render saw and point
    /// the slot at its new owner.
    pub(crate) fn commit(&mut self, owner: FiberId) {
        self.slot.consume(self.consumed);
        self.slot.set_owner(owner);
        self.consumed = 0;
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("owner", &self.slot.owner())
            .field("pending", &self.slot.pending())
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// SetState
// =============================================================================

/// State setter handed out by [`Hooks::use_state`].
///
/// Safe to call from anywhere, including host event handlers: it only
/// enqueues and requests scheduling.
pub struct SetState<T> {
    slot: Weak<StateSlot<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self { slot: self.slot.clone() }
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState").field("live", &(self.slot.strong_count() > 0)).finish()
    }
}

impl<T: Clone + 'static> SetState<T> {
    fn detached() -> Self {
        Self { slot: Weak::new() }
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        self.push(Update::Replace(value));
    }

    /// Derive the value from the previous one.
    pub fn update(&self, f: impl Fn(&T) -> T + 'static) {
        self.push(Update::Apply(Rc::new(f)));
    }

    /// False once the owning component has been deleted.
    pub fn is_live(&self) -> bool {
        self.slot.strong_count() > 0
    }

    fn push(&self, update: Update<T>) {
        let Some(slot) = self.slot.upgrade() else {
            trace!("state update dropped: hook no longer mounted");
            return;
        };

        slot.queue.borrow_mut().push_back(update);
        trace!(owner = ?slot.owner.get(), pending = slot.queue.borrow().len(), "state update queued");

        if let Some(updates) = slot.updates.upgrade() {
            let dirty: Weak<dyn HookSlot> = Rc::downgrade(&slot) as Weak<dyn HookSlot>;
            updates.mark(dirty);
            updates.request();
        }
    }
}

// =============================================================================
// Hooks - Render-scoped cursor
// =============================================================================

/// Hook cursor bound to the component fiber being rendered.
///
/// Only the reconciler creates one, and only for the duration of a single
/// component call.
pub struct Hooks<'a> {
    fiber: FiberId,
    component: &'a str,
    previous: &'a [Hook],
    mounting: bool,
    next: Vec<Hook>,
    calls: usize,
    updates: &'a Rc<UpdateQueue>,
    error: Option<HookError>,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(
        fiber: FiberId,
        component: &'a str,
        previous: &'a [Hook],
        mounting: bool,
        updates: &'a Rc<UpdateQueue>,
    ) -> Self {
        Self {
            fiber,
            component,
            previous,
            mounting,
            next: Vec::with_capacity(previous.len()),
            calls: 0,
            updates,
            error: None,
        }
    }

    /// Read (or on first render, create) the next state slot.
    ///
    /// `initial` is only used when the slot is created. On any misuse the
    /// render is failed after the component returns; the call itself still
    /// returns `initial` and a setter that does nothing.
    pub fn use_state<T: Clone + 'static>(&mut self, initial: T) -> (T, SetState<T>) {
        let index = self.calls;
        self.calls += 1;

        if self.error.is_some() {
            return (initial, SetState::detached());
        }

        if let Some(previous) = self.previous.get(index) {
            let Some((slot, base)) = previous.typed::<T>() else {
                self.error = Some(HookError::TypeMismatch {
                    component: self.component.to_string(),
                    slot: index,
                });
                return (initial, SetState::detached());
            };

            let (value, consumed) = slot.resolve(base);
            self.next.push(Hook {
                slot: previous.slot.clone(),
                value: Rc::new(value.clone()),
                consumed,
            });
            return (value, SetState { slot: Rc::downgrade(&slot) });
        }

        if !self.mounting {
            // Count mismatch, reported by finish()
            return (initial, SetState::detached());
        }

        let slot = Rc::new(StateSlot::<T> {
            owner: Cell::new(self.fiber),
            queue: RefCell::new(VecDeque::new()),
            updates: Rc::downgrade(self.updates),
        });
        let setter = SetState { slot: Rc::downgrade(&slot) };
        self.next.push(Hook {
            slot,
            value: Rc::new(initial.clone()),
            consumed: 0,
        });
        (initial, setter)
    }

    /// Number of `use_state` calls so far in this render.
    pub fn position(&self) -> usize {
        self.calls
    }

    /// Close the render and hand back the fiber's new hook list.
    pub(crate) fn finish(self) -> Result<Vec<Hook>, HookError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        if !self.mounting && self.calls != self.previous.len() {
            return Err(HookError::CountMismatch {
                component: self.component.to_string(),
                expected: self.previous.len(),
                found: self.calls,
            });
        }

        Ok(self.next)
    }
}

// =============================================================================
// Tests
// =============================================================================
