//! Runtime - Public entry point and load boundary.
//!
//! A [`Runtime`] starts unloaded. Every operation on it fails with
//! [`Error::Initialization`] until [`Runtime::load`] supplies the host tree,
//! the continuation scheduler and the engine configuration.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use std::cell::Cell;
//! use spark_fiber::{children, EngineConfig, Props, Runtime, Unbounded};
//! # use spark_fiber::{HostTree, HostError, EventHandler, PropValue};
//! # #[derive(Default)]
//! # struct Host { nodes: usize }
//! # impl HostTree for Host {
//! #     type Node = usize;
//! #     fn contains(&self, node: &usize) -> bool { *node <= self.nodes }
//! #     fn create_element(&mut self, _: &str) -> Result<usize, HostError> { self.nodes += 1; Ok(self.nodes) }
//! #     fn create_text(&mut self, _: &str) -> Result<usize, HostError> { self.nodes += 1; Ok(self.nodes) }
//! #     fn set_property(&mut self, _: &usize, _: &str, _: &PropValue) -> Result<(), HostError> { Ok(()) }
//! #     fn remove_property(&mut self, _: &usize, _: &str) -> Result<(), HostError> { Ok(()) }
//! #     fn set_text(&mut self, _: &usize, _: &str) -> Result<(), HostError> { Ok(()) }
//! #     fn add_listener(&mut self, _: &usize, _: &str, _: &EventHandler) -> Result<(), HostError> { Ok(()) }
//! #     fn remove_listener(&mut self, _: &usize, _: &str, _: &EventHandler) -> Result<(), HostError> { Ok(()) }
//! #     fn insert_before(&mut self, _: &usize, _: &usize, _: Option<&usize>) -> Result<(), HostError> { Ok(()) }
//! #     fn remove(&mut self, _: &usize) -> Result<(), HostError> { Ok(()) }
//! # }
//!
//! let wake = Rc::new(Cell::new(false));
//! let flag = wake.clone();
//!
//! let mut runtime = Runtime::new();
//! runtime.load(Host::default(), move || flag.set(true), EngineConfig::default());
//!
//! let app = runtime.create_element("div", Props::new().with("id", "app"), children!["hello"])?;
//! runtime.render(app, 0)?;
//! assert!(wake.get());
//!
//! runtime.work_loop(&Unbounded)?;
//! # Ok::<(), spark_fiber::Error>(())
//! ```

use std::rc::Rc;

use tracing::info;

use super::commit::CommitStats;
use super::work_loop::{Context, SliceOutcome};
use crate::config::EngineConfig;
use crate::engine::{Fiber, FiberId};
use crate::error::{Error, HookError, Result};
use crate::host::{Deadline, HostTree, Schedule};
use crate::primitives::{Child, Element, Tag, create_element};
use crate::state::SetState;
use crate::types::{Phase, Props};

/// Reconciliation runtime bound to one host tree.
pub struct Runtime<H: HostTree> {
    context: Option<Context<H>>,
}

impl<H: HostTree> Default for Runtime<H> {
    fn default() -> Self {
        Self { context: None }
    }
}

impl<H: HostTree> Runtime<H> {
    /// Unloaded runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the host capabilities. Replaces any previously loaded state.
    pub fn load(&mut self, host: H, schedule: impl Schedule + 'static, config: EngineConfig) {
        info!(?config, "runtime loaded");
        self.context = Some(Context::new(host, Rc::new(schedule), config));
    }

    /// Drop all engine state and hand the host back.
    pub fn unload(&mut self) -> Option<H> {
        self.context.take().map(|context| context.host)
    }

    pub fn is_loaded(&self) -> bool {
        self.context.is_some()
    }

    fn context(&self, operation: &'static str) -> Result<&Context<H>> {
        self.context.as_ref().ok_or(Error::Initialization { operation })
    }

    fn context_mut(&mut self, operation: &'static str) -> Result<&mut Context<H>> {
        self.context.as_mut().ok_or(Error::Initialization { operation })
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Build an element. Same normalization as [`create_element`].
    pub fn create_element(
        &self,
        tag: impl Into<Tag>,
        props: impl Into<Option<Props>>,
        children: impl IntoIterator<Item = Child>,
    ) -> Result<Element> {
        self.context("create_element")?;
        Ok(create_element(tag, props, children))
    }

    /// Schedule a top-level render of `element` into `host_root`.
    ///
    /// Returns once the pass is set up; the work happens in [`work_loop`]
    /// slices. Rendering again before the pass commits discards it.
    ///
    /// [`work_loop`]: Runtime::work_loop
    pub fn render(&mut self, element: Element, host_root: H::Node) -> Result<()> {
        self.context_mut("render")?.render(element, host_root)
    }

    /// Run one slice. Hosts call this from the continuation they scheduled.
    pub fn work_loop(&mut self, deadline: &dyn Deadline) -> Result<SliceOutcome> {
        self.context_mut("work_loop")?.work_loop(deadline)
    }

    /// Load-state check for the state hook. Never returns state.
    ///
    /// Fails with [`Error::Initialization`] before [`load`](Runtime::load)
    /// and with [`HookError::OutsideRender`] after it. State hooks only exist
    /// inside a component render, through the [`Hooks::use_state`] handle the
    /// component receives.
    ///
    /// [`Hooks::use_state`]: crate::state::Hooks::use_state
    pub fn use_state<T: Clone + 'static>(&self, _initial: T) -> Result<(T, SetState<T>)> {
        self.context("use_state")?;
        Err(HookError::OutsideRender.into())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn phase(&self) -> Phase {
        self.context.as_ref().map_or(Phase::Idle, Context::phase)
    }

    pub fn host(&self) -> Option<&H> {
        self.context.as_ref().map(Context::host)
    }

    pub fn host_mut(&mut self) -> Option<&mut H> {
        self.context.as_mut().map(Context::host_mut)
    }

    pub fn last_commit(&self) -> Option<&CommitStats> {
        self.context.as_ref().and_then(Context::last_commit)
    }

    /// Root of the committed tree.
    pub fn current_root(&self) -> Option<FiberId> {
        self.context.as_ref().and_then(Context::current_root)
    }

    pub fn fiber(&self, id: FiberId) -> Option<&Fiber<H::Node>> {
        self.context.as_ref().and_then(|context| context.fibers().get(id))
    }
}

// =============================================================================
// Tests
// =============================================================================
