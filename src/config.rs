//! Engine configuration, fixed at load time.

use std::num::NonZeroUsize;

/// Tuning knobs for the work loop and commit phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Hard cap on units of work per slice, on top of the host deadline.
    pub max_units_per_slice: Option<NonZeroUsize>,
    /// Skip fibers whose element was not rebuilt and whose subtree has no
    /// queued state updates, adopting their committed children instead.
    pub reuse_unchanged_subtrees: bool,
    /// Properties written on every update even when unchanged, so controlled
    /// host inputs (`value`, `checked`) cannot drift from the props.
    pub controlled_properties: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_units_per_slice: None,
            reuse_unchanged_subtrees: true,
            controlled_properties: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_units_per_slice(mut self, units: usize) -> Self {
        self.max_units_per_slice = NonZeroUsize::new(units);
        self
    }

    pub fn with_subtree_reuse(mut self, enabled: bool) -> Self {
        self.reuse_unchanged_subtrees = enabled;
        self
    }

    pub fn with_controlled_property(mut self, name: impl Into<String>) -> Self {
        self.controlled_properties.push(name.into());
        self
    }

    pub(crate) fn is_controlled(&self, name: &str) -> bool {
        self.controlled_properties.iter().any(|p| p == name)
    }
}
