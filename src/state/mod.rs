//! State Module - Local component state.
//!
//! - **Hooks** - position-indexed state slots, setters and their update queue

mod hooks;

pub use hooks::{Hook, Hooks, SetState};
pub(crate) use hooks::UpdateQueue;
