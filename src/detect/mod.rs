//! Face detection module
//!
//! The pipeline treats detection as an opaque capability: `detect` returns
//! at most one face region per frame and must tolerate returning nothing on
//! every call. The concrete implementation runs a YOLO-face ONNX model via
//! ONNX Runtime; if the model cannot be loaded the capability is simply
//! absent and frames pass through unstyled.

pub mod onnx;

pub use onnx::OnnxFaceDetector;

use crate::camera::Frame;

/// A detected face bounding box, valid only against the frame it was
/// computed from.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Five facial keypoints (eyes, nose, mouth corners) when the model
    /// reports them, in frame coordinates.
    pub landmarks: Option<[(f32, f32); 5]>,
    pub confidence: f32,
}

impl FaceRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            landmarks: None,
            confidence: 1.0,
        }
    }

    /// Clamp the box to frame bounds. Returns `None` when nothing visible
    /// remains, so degenerate regions short-circuit instead of faulting.
    pub fn clamped(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = self.x.saturating_add(self.width).min(frame_width as i32);
        let y1 = self.y.saturating_add(self.height).min(frame_height as i32);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Opaque face-location capability.
///
/// Implementations may be stateful (warmed-up inference sessions), hence
/// `&mut self`. Any internal failure must surface as `None`, never as a
/// pipeline fault.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Option<FaceRegion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_inside_frame() {
        let r = FaceRegion::new(10, 20, 100, 50);
        assert_eq!(r.clamped(640, 480), Some((10, 20, 100, 50)));
    }

    #[test]
    fn test_clamped_partially_outside() {
        let r = FaceRegion::new(-20, -10, 100, 50);
        assert_eq!(r.clamped(640, 480), Some((0, 0, 80, 40)));
    }

    #[test]
    fn test_clamped_zero_area_is_none() {
        let r = FaceRegion::new(10, 10, 0, 50);
        assert_eq!(r.clamped(640, 480), None);
        let r = FaceRegion::new(10, 10, 50, 0);
        assert_eq!(r.clamped(640, 480), None);
    }

    #[test]
    fn test_clamped_fully_outside_is_none() {
        let r = FaceRegion::new(700, 10, 50, 50);
        assert_eq!(r.clamped(640, 480), None);
        let r = FaceRegion::new(-100, 10, 50, 50);
        assert_eq!(r.clamped(640, 480), None);
    }
}
