//! # FBX2GLB Server
//!
//! A small HTTP service that converts uploaded FBX models into binary glTF
//! (`.glb`) by shelling out to FBX2glTF.
//!
//! ## Request Flow
//!
//! ```text
//!   POST /v1/convert/ (multipart, field "model")
//!            │
//!            ▼
//!   ┌──────────────────┐   ┌────────────────────┐   ┌─────────────────┐
//!   │ validate + store │──▶│ FBX2glTF -i … -o … │──▶│ remove upload,  │
//!   │ task-<id>/x.fbx  │   │ --binary           │   │ return x.glb    │
//!   └──────────────────┘   └────────────────────┘   └─────────────────┘
//! ```
//!
//! Every request gets its own workspace under `data/tasks/task-<id>`, which
//! is kept after the request so the artifact can be fetched via static
//! file serving.
//!
//! ## Modules
//! - `api`: routes, the convert handler, error responses
//! - `config`: environment configuration
//! - `converter`: locating and running FBX2glTF
//! - `task`: task ids and workspaces
//! - `upload`: filename validation and streaming to disk

pub mod api;
pub mod config;
pub mod converter;
pub mod task;
pub mod upload;

#[cfg(all(test, unix))]
mod testing;

pub use config::Config;
pub use converter::{ConvertError, Converter};
pub use task::{Task, TaskAllocator, TaskId};
