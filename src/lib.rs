//! Facecast - real-time face styling backend
//!
//! Captures webcam frames, applies a selected visual style to the detected
//! face region, and republishes the result to a virtual camera device and to
//! WebSocket viewers. Controlled over an HTTP + WebSocket API.

pub mod api;
pub mod camera;
pub mod detect;
pub mod effects;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod telemetry;

pub use pipeline::PipelineController;
pub use settings::Settings;
