//! Output sinks
//!
//! Two independent consumers of processed frames: the virtual camera device
//! and the WebSocket broadcaster. Both absorb their own failures; nothing in
//! here may propagate an error back into the pipeline loop.

pub mod broadcast;
pub mod virtualcam;

pub use broadcast::{Broadcaster, Outbound};
pub use virtualcam::VirtualCamera;

use crate::camera::Frame;

/// A consumer of processed frames. `send` must never fail the caller.
pub trait FrameSink: Send + Sync {
    fn send(&self, frame: &Frame);
}

/// The virtual-camera output path: a `FrameSink` with an explicit open/close
/// lifecycle, degraded to a no-op when the device is unavailable.
pub trait DeviceSink: FrameSink {
    /// Attempt to open the device. Returns whether it is now active;
    /// failure degrades the sink rather than erroring.
    fn open(&self) -> bool;
    fn close(&self);
    fn is_active(&self) -> bool;
}
