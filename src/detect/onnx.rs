//! YOLO-face detection via ONNX Runtime.
//!
//! Preprocesses frames with letterbox resize, runs the session, and keeps
//! the single highest-confidence detection above threshold. Inference errors
//! are logged and reported as "no face" so the pipeline never stalls on the
//! detector.

use std::path::Path;

use ndarray::Array4;

use crate::camera::Frame;
use crate::detect::{FaceDetector, FaceRegion};

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Minimum detection confidence.
const CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESHOLD: f32 = 0.5;

/// Number of keypoint values per detection (5 landmarks x 3: x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Face detector backed by an ONNX Runtime session.
pub struct OnnxFaceDetector {
    session: ort::session::Session,
    input_size: u32,
}

impl OnnxFaceDetector {
    /// Load a YOLO-face ONNX model and prepare for inference.
    pub fn load(model_path: &Path) -> Result<Self, String> {
        if !model_path.exists() {
            return Err(format!("Face model not found: {:?}", model_path));
        }

        ort::init()
            .with_name("Facecast")
            .commit()
            .map_err(|e| format!("Failed to initialize ONNX Runtime: {}", e))?;

        let session = ort::session::Session::builder()
            .map_err(|e| format!("Failed to create session builder: {}", e))?
            .with_intra_threads(2)
            .map_err(|e| format!("Failed to set threads: {}", e))?
            .commit_from_file(model_path)
            .map_err(|e| format!("Failed to load face model: {}", e))?;

        log::info!("Loaded face model from {:?}", model_path);

        Ok(Self {
            session,
            input_size: DEFAULT_INPUT_SIZE,
        })
    }

    fn run(&mut self, frame: &Frame) -> Result<Option<FaceRegion>, String> {
        let (tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size);

        let input_tensor = ort::value::Tensor::from_array(tensor)
            .map_err(|e| format!("Failed to create tensor: {}", e))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| format!("Inference failed: {}", e))?;

        let output = outputs
            .iter()
            .next()
            .ok_or("No output from face model")?;

        let (shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| format!("Failed to extract output: {}", e))?;

        let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        Ok(best_detection(&shape, data, scale, pad_x, pad_y))
    }
}

impl FaceDetector for OnnxFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Option<FaceRegion> {
        match self.run(frame) {
            Ok(region) => region,
            Err(e) => {
                log::warn!("Face detection error: {}", e);
                None
            }
        }
    }
}

/// Letterbox-resize a frame to `target` x `target`, normalized NCHW float32.
///
/// Returns `(tensor, scale, pad_x, pad_y)` for mapping detections back to
/// frame coordinates.
fn letterbox(frame: &Frame, target: u32) -> (Array4<f32>, f32, u32, u32) {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let t = target as f32;

    let scale = (t / fw).min(t / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    // Pad with 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor = Array4::<f32>::from_elem((1, 3, target as usize, target as usize), gray);

    let data = frame.data();
    let src_w = frame.width() as usize;
    let src_h = frame.height() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f32 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f32 / scale) as usize).min(src_w - 1);
            let src_idx = (src_y * src_w + src_x) * 3;
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = data[src_idx + c] as f32 / 255.0;
            }
        }
    }

    (tensor, scale, pad_x, pad_y)
}

/// Pick the single highest-confidence detection from raw YOLO output.
///
/// Output is `[1, features, detections]` (transposed) or
/// `[1, detections, features]`; rows are `[cx, cy, w, h, conf, kp...]` in
/// letterbox coordinates.
fn best_detection(
    shape: &[usize],
    data: &[f32],
    scale: f32,
    pad_x: u32,
    pad_y: u32,
) -> Option<FaceRegion> {
    if shape.len() != 3 {
        return None;
    }
    let (num_dets, num_feats, transposed) = if shape[1] < shape[2] {
        (shape[2], shape[1], true)
    } else {
        (shape[1], shape[2], false)
    };
    if num_feats < 5 {
        return None;
    }

    let feature = |det: usize, feat: usize| -> f32 {
        if transposed {
            data[feat * num_dets + det]
        } else {
            data[det * num_feats + feat]
        }
    };

    let mut best: Option<(usize, f32)> = None;
    for i in 0..num_dets {
        let conf = feature(i, 4);
        if conf < CONFIDENCE_THRESHOLD {
            continue;
        }
        if best.map_or(true, |(_, c)| conf > c) {
            best = Some((i, conf));
        }
    }
    let (det, conf) = best?;

    let cx = feature(det, 0);
    let cy = feature(det, 1);
    let w = feature(det, 2);
    let h = feature(det, 3);

    // Map from letterbox coordinates back to the original frame
    let to_frame = |v: f32, pad: u32| (v - pad as f32) / scale;
    let x = to_frame(cx - w / 2.0, pad_x);
    let y = to_frame(cy - h / 2.0, pad_y);

    // All five points or none: a partial set would leave placeholder
    // coordinates indistinguishable from real ones.
    let landmarks = if num_feats >= 5 + NUM_KEYPOINT_VALUES {
        let mut pts = [(0.0f32, 0.0f32); 5];
        let mut all_visible = true;
        for k in 0..5 {
            let kconf = feature(det, 5 + k * 3 + 2);
            if kconf < KEYPOINT_CONF_THRESHOLD {
                all_visible = false;
                break;
            }
            pts[k] = (
                to_frame(feature(det, 5 + k * 3), pad_x),
                to_frame(feature(det, 5 + k * 3 + 1), pad_y),
            );
        }
        all_visible.then_some(pts)
    } else {
        None
    };

    Some(FaceRegion {
        x: x.round() as i32,
        y: y.round() as i32,
        width: (w / scale).round() as i32,
        height: (h / scale).round() as i32,
        landmarks,
        confidence: conf,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 frame -> letterbox to 640x640
        // scale = min(640/200, 640/100) = 3.2; new = 640x320; pad_y = 160
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert!((scale - 3.2).abs() < 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized_and_padded() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 0);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640);
        assert_eq!(pad_x, 0);
        assert!(pad_y > 0);

        // Image region pixel is ~1.0, pad pixel is ~114/255
        let y = pad_y as usize + 1;
        assert!((tensor[[0, 0, y, 1]] - 1.0).abs() < 0.01);
        assert!((tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 0.01);
    }

    /// Build a `[1, dets, feats]` output with 5 box features per detection.
    fn plain_output(rows: &[[f32; 5]]) -> (Vec<usize>, Vec<f32>) {
        let shape = vec![1, rows.len(), 5];
        let data = rows.iter().flatten().copied().collect();
        (shape, data)
    }

    #[test]
    fn test_best_detection_picks_highest_confidence() {
        let (shape, data) = plain_output(&[
            [100.0, 100.0, 40.0, 40.0, 0.4],
            [300.0, 200.0, 80.0, 60.0, 0.9],
        ]);
        let region = best_detection(&shape, &data, 1.0, 0, 0).unwrap();
        assert_eq!(region.x, 260);
        assert_eq!(region.y, 170);
        assert_eq!(region.width, 80);
        assert_eq!(region.height, 60);
        assert!((region.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_best_detection_none_below_threshold() {
        let (shape, data) = plain_output(&[[100.0, 100.0, 40.0, 40.0, 0.1]]);
        assert!(best_detection(&shape, &data, 1.0, 0, 0).is_none());
    }

    #[test]
    fn test_best_detection_unletterboxes_coordinates() {
        // scale 2.0 with pad_x 10: letterbox (110, 60) box center maps back
        let (shape, data) = plain_output(&[[110.0, 60.0, 20.0, 20.0, 0.8]]);
        let region = best_detection(&shape, &data, 2.0, 10, 0).unwrap();
        assert_eq!(region.x, 45); // (110 - 20/2 - 10) / 2 = 45
        assert_eq!(region.y, 25);
        assert_eq!(region.width, 10);
        assert_eq!(region.height, 10);
    }

    #[test]
    fn test_best_detection_transposed_layout() {
        // [1, feats=5, dets=2] column-major per feature
        let shape = vec![1usize, 5, 2];
        #[rustfmt::skip]
        let data = vec![
            100.0, 300.0, // cx
            100.0, 200.0, // cy
            40.0, 80.0,   // w
            40.0, 60.0,   // h
            0.4, 0.9,     // conf
        ];
        let region = best_detection(&shape, &data, 1.0, 0, 0).unwrap();
        assert_eq!(region.width, 80);
    }

    #[test]
    fn test_best_detection_bad_shape() {
        assert!(best_detection(&[1, 5], &[0.0; 5], 1.0, 0, 0).is_none());
    }

    /// Build a `[1, 1, 20]` output: one detection with box + 5 keypoints.
    fn keypoint_output(kp_confs: [f32; 5]) -> (Vec<usize>, Vec<f32>) {
        let mut row = vec![100.0, 100.0, 40.0, 40.0, 0.9];
        for (k, conf) in kp_confs.iter().enumerate() {
            row.push(50.0 + k as f32 * 10.0); // x
            row.push(60.0 + k as f32 * 10.0); // y
            row.push(*conf);
        }
        (vec![1, 1, 20], row)
    }

    #[test]
    fn test_landmarks_present_when_all_keypoints_visible() {
        let (shape, data) = keypoint_output([0.9; 5]);
        let region = best_detection(&shape, &data, 1.0, 0, 0).unwrap();
        let pts = region.landmarks.expect("all keypoints visible");
        assert_eq!(pts[0], (50.0, 60.0));
        assert_eq!(pts[4], (90.0, 100.0));
    }

    #[test]
    fn test_landmarks_omitted_when_any_keypoint_hidden() {
        // One low-confidence point must not yield a partially filled set
        let (shape, data) = keypoint_output([0.9, 0.9, 0.1, 0.9, 0.9]);
        let region = best_detection(&shape, &data, 1.0, 0, 0).unwrap();
        assert!(region.landmarks.is_none());
        // The box itself is unaffected
        assert_eq!(region.width, 40);
    }
}
