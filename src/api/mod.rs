//! HTTP and WebSocket control surface
//!
//! REST endpoints for lifecycle and style control, plus a WebSocket that
//! streams processed frames and status updates to viewers and accepts the
//! same control actions as the REST surface.

pub mod routes;
pub mod server;
pub mod types;
pub mod websocket;

pub use routes::create_router;
pub use server::run_server;
pub use types::*;

use std::sync::Arc;

use crate::pipeline::PipelineController;

/// Shared handle passed to every handler.
pub type ApiState = Arc<PipelineController>;
