//! Fiber Registry - Slot allocation for fibers.
//!
//! Fibers live in one arena and refer to each other by [`FiberId`]:
//! - Free slot pool for O(1) reuse
//! - Per-slot generation so a handle to a released fiber never resolves
//!   to the fiber that later reuses its slot
//! - Parent / child-chain iterators built on the structural links

use super::fiber::Fiber;

// =============================================================================
// FiberId
// =============================================================================

/// Stable handle to a fiber (slot index + generation).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FiberId {
    index: u32,
    generation: u32,
}

impl FiberId {
    pub(crate) const fn index(self) -> usize {
        self.index as usize
    }
}

// =============================================================================
// Registry State
// =============================================================================

/// Arena owning every fiber of the current and work-in-progress trees.
pub struct FiberRegistry<N> {
    slots: Vec<Option<Fiber<N>>>,
    /// Last generation per slot (persists across releases).
    generations: Vec<u32>,
    free: Vec<usize>,
    allocated: usize,
}

impl<N> Default for FiberRegistry<N> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            allocated: 0,
        }
    }
}

impl<N> FiberRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a slot for `fiber`, reusing a released one when available.
    pub fn allocate(&mut self, fiber: Fiber<N>) -> FiberId {
        self.allocated += 1;

        if let Some(index) = self.free.pop() {
            self.slots[index] = Some(fiber);
            return FiberId { index: index as u32, generation: self.generations[index] };
        }

        let index = self.slots.len();
        self.slots.push(Some(fiber));
        if index == self.generations.len() {
            self.generations.push(0);
        }
        FiberId { index: index as u32, generation: self.generations[index] }
    }

    /// Release a fiber. Stale handles are ignored.
    pub fn release(&mut self, id: FiberId) -> Option<Fiber<N>> {
        if !self.contains(id) {
            return None;
        }

        let index = id.index();
        let fiber = self.slots[index].take();
        self.generations[index] = self.generations[index].wrapping_add(1);
        self.free.push(index);
        self.allocated -= 1;

        // Drop the pool once everything is gone
        if self.allocated == 0 {
            self.slots.clear();
            self.free.clear();
            // Generations are kept so old handles stay stale.
        }

        fiber
    }

    pub fn contains(&self, id: FiberId) -> bool {
        let index = id.index();
        self.generations.get(index) == Some(&id.generation)
            && self.slots.get(index).is_some_and(Option::is_some)
    }

    pub fn get(&self, id: FiberId) -> Option<&Fiber<N>> {
        if !self.contains(id) {
            return None;
        }
        self.slots[id.index()].as_ref()
    }

    pub fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<N>> {
        if !self.contains(id) {
            return None;
        }
        self.slots[id.index()].as_mut()
    }

    /// Number of live fibers.
    pub fn len(&self) -> usize {
        self.allocated
    }

    pub fn is_empty(&self) -> bool {
        self.allocated == 0
    }

    // =========================================================================
    // Structural Walks
    // =========================================================================

    /// Children of `id` in sibling order.
    pub fn children(&self, id: FiberId) -> Children<'_, N> {
        Children {
            registry: self,
            next: self.get(id).and_then(|fiber| fiber.child),
        }
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: FiberId) -> Ancestors<'_, N> {
        Ancestors {
            registry: self,
            next: self.get(id).and_then(|fiber| fiber.parent),
        }
    }

    /// Every fiber reachable from `root` through child links, pre-order.
    ///
    /// Fibers marked as having adopted their children are yielded but not
    /// descended into.
    pub fn subtree(&self, root: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(fiber) = self.get(id) else { continue };
            out.push(id);

            if fiber.flags.contains(crate::types::FiberFlags::ADOPTED_CHILDREN) {
                continue;
            }

            // Push in reverse so the first child is visited first
            let start = stack.len();
            stack.extend(self.children(id));
            stack[start..].reverse();
        }

        out
    }
}

/// Iterator over a sibling chain.
pub struct Children<'a, N> {
    registry: &'a FiberRegistry<N>,
    next: Option<FiberId>,
}

impl<N> Iterator for Children<'_, N> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let id = self.next?;
        self.next = self.registry.get(id).and_then(|fiber| fiber.sibling);
        Some(id)
    }
}

/// Iterator over parent links.
pub struct Ancestors<'a, N> {
    registry: &'a FiberRegistry<N>,
    next: Option<FiberId>,
}

impl<N> Iterator for Ancestors<'_, N> {
    type Item = FiberId;

    fn next(&mut self) -> Option<FiberId> {
        let id = self.next?;
        self.next = self.registry.get(id).and_then(|fiber| fiber.parent);
        Some(id)
    }
}

// =============================================================================
// Tests
// =============================================================================
