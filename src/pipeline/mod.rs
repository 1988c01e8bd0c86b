//! Reconciliation Pipeline
//!
//! Connects element descriptions to host-tree mutations in two phases.
//!
//! # Pipeline Architecture
//!
//! ```text
//! render(element) → work_loop slices → begin_work / complete_work per fiber → commit
//! ```
//!
//! ## Phases
//!
//! 1. **Reconcile** - interruptible; builds the work-in-progress tree and
//!    detached host nodes, one fiber per unit of work
//! 2. **Commit** - atomic; the only phase that mutates attached host nodes
//!
//! ## Key Design Principles
//!
//! - **Double buffering**: the committed tree stays intact until the new one
//!   is complete, so an abandoned pass leaves nothing behind
//! - **Explicit context**: all loop state lives on [`Context`], never in globals
//! - **Cooperative**: the host decides when slices run and how long they get

mod commit;
mod reconcile;
mod runtime;
mod work_loop;

pub use commit::CommitStats;
pub use runtime::Runtime;
pub use work_loop::{Context, SliceOutcome};
