//! Task module - per-request workspaces.
//!
//! # Key Concepts
//! - Task: one conversion request, identified by a monotonic id
//! - Workspace: the directory owned by exactly one task (`<data>/tasks/task-<id>`)
//! - Paths: pure functions mapping (data root, id, file name) to locations on disk

mod allocator;
pub mod paths;

pub use allocator::{Task, TaskAllocator, TaskError, TaskId};
