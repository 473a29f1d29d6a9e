//! HTTP API.
//!
//! - `POST /v1/convert/` - convert an uploaded FBX model
//! - `GET /*` - status page and produced artifacts, straight from disk

mod convert;
pub mod error;
mod routes;

pub use error::ApiError;
pub use routes::{router, serve, AppState};
