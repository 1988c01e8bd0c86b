//! Error taxonomy for the engine.
//!
//! Structural errors ([`Error::Initialization`], [`Error::HookContext`]) abort
//! the render pass they occur in. [`Error::HostMutation`] during commit stops
//! the remaining commit work. Nothing is retried; a new `render` call is the
//! recovery path.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the engine to its host.
#[derive(Debug, Error)]
pub enum Error {
    /// A boundary operation was invoked before the engine was loaded.
    #[error("'{operation}' used before the engine was loaded")]
    Initialization {
        /// Name of the boundary operation that was rejected.
        operation: &'static str,
    },

    /// State-hook misuse.
    #[error(transparent)]
    HookContext(#[from] HookError),

    /// Render requested against an invalid or missing host root.
    #[error("cannot mount: {reason}")]
    Mount {
        /// Why the host root was rejected.
        reason: String,
    },

    /// The host tree rejected a node or property operation.
    #[error("host rejected {operation}: {source}")]
    HostMutation {
        /// The host operation that failed.
        operation: &'static str,
        #[source]
        source: HostError,
    },
}

impl Error {
    pub(crate) fn host(operation: &'static str) -> impl FnOnce(HostError) -> Self {
        move |source| Self::HostMutation { operation, source }
    }

    /// True for errors that abort a render pass without committing anything.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Initialization { .. } | Self::HookContext(_))
    }
}

/// Violations of the state-hook contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// `use_state` was called while no functional component was rendering.
    #[error("use_state called outside of a component render")]
    OutsideRender,

    /// A component called `use_state` a different number of times than on
    /// its previous render.
    #[error("component '{component}' called use_state {found} times, previously {expected}")]
    CountMismatch {
        component: String,
        expected: usize,
        found: usize,
    },

    /// A slot was read back with a different value type than it was created with.
    #[error("component '{component}' changed the value type of hook slot {slot}")]
    TypeMismatch { component: String, slot: usize },
}

/// Failure reported by a host-tree capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
