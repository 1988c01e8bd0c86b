//! # spark-fiber
//!
//! Incremental, interruptible UI-tree reconciliation for Rust.
//!
//! ## Architecture
//!
//! Callers describe the UI as immutable [`Element`]s. The runtime diffs each
//! new description against the committed fiber tree in small units of work,
//! yielding to the host between units, and applies the result to the host
//! tree in one uninterrupted commit.
//!
//! ```text
//! Element tree → work-in-progress fibers (sliced) → commit → HostTree mutations
//! ```
//!
//! Functional components keep local state through position-indexed hooks;
//! setters only enqueue and ask the host for another slice.
//!
//! ## Modules
//!
//! - [`types`] - Core types (Props, PropValue, EventHandler, EffectTag, ...)
//! - [`primitives`] - Element factory and functional components
//! - [`engine`] - Fiber arena and tree links
//! - [`state`] - Hook engine
//! - [`pipeline`] - Work loop, reconciler, commit and the [`Runtime`] entry point
//! - [`host`] - Capabilities the host provides (tree, scheduling, deadlines)
//!
//! ## Example
//!
//! ```
//! use spark_fiber::{children, create_element, Component, Props};
//!
//! let greeting = Component::new("Greeting", |props, _hooks| {
//!     let name = props.get("name").and_then(|v| v.as_str()).unwrap_or("world");
//!     Some(create_element("h1", None, children![format!("hello {name}")]))
//! });
//!
//! let app = create_element(&greeting, Props::new().with("name", "fiber"), Vec::new());
//! assert!(app.is_component());
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod pipeline;
pub mod primitives;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::EngineConfig;

pub use error::{Error, HookError, HostError, Result};

pub use engine::{Fiber, FiberId, FiberKind};

pub use host::{Deadline, HostTree, Schedule, TimeBudget, Unbounded, UnitBudget};

pub use pipeline::{CommitStats, Runtime, SliceOutcome};

pub use primitives::{Child, Component, Element, Tag, create_element, text_element};

pub use state::{Hooks, SetState};
