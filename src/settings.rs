//! Settings management
//!
//! Runtime configuration loaded from a JSON file named by `FACECAST_CONFIG`,
//! with per-field defaults so a partial (or absent) file still yields a
//! complete configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP/WebSocket API port (default 8765)
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Physical camera index for capture (default 0)
    #[serde(default)]
    pub camera_index: u32,

    /// Processing loop rate in frames per second (default 30)
    #[serde(default = "default_process_fps")]
    pub process_fps: u32,

    /// v4l2loopback device path for the virtual camera
    #[serde(default = "default_virtualcam_path")]
    pub virtualcam_path: String,

    /// Virtual camera output width (default 1280)
    #[serde(default = "default_virtualcam_width")]
    pub virtualcam_width: u32,

    /// Virtual camera output height (default 720)
    #[serde(default = "default_virtualcam_height")]
    pub virtualcam_height: u32,

    /// Frame rate advertised on the virtual camera (default 30)
    #[serde(default = "default_virtualcam_fps")]
    pub virtualcam_fps: u32,

    /// JPEG quality for WebSocket preview frames, 1-100 (default 70)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Path to the face-detection ONNX model
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

fn default_api_port() -> u16 {
    8765
}

fn default_process_fps() -> u32 {
    30
}

fn default_virtualcam_path() -> String {
    "/dev/video10".to_string()
}

fn default_virtualcam_width() -> u32 {
    1280
}

fn default_virtualcam_height() -> u32 {
    720
}

fn default_virtualcam_fps() -> u32 {
    30
}

fn default_jpeg_quality() -> u8 {
    70
}

fn default_model_path() -> String {
    "models/yolov8n-face.onnx".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            camera_index: 0,
            process_fps: default_process_fps(),
            virtualcam_path: default_virtualcam_path(),
            virtualcam_width: default_virtualcam_width(),
            virtualcam_height: default_virtualcam_height(),
            virtualcam_fps: default_virtualcam_fps(),
            jpeg_quality: default_jpeg_quality(),
            model_path: default_model_path(),
        }
    }
}

impl Settings {
    /// Clamp values to sane operating ranges. Dimensions are capped at 8K
    /// so resize buffer sizes always fit comfortably in a `u32` pixel count.
    pub fn clamp(&mut self) {
        self.process_fps = self.process_fps.clamp(1, 120);
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.virtualcam_width = self.virtualcam_width.clamp(1, 7680);
        self.virtualcam_height = self.virtualcam_height.clamp(1, 4320);
    }

    /// Load settings from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
        let mut settings: Self = serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
        settings.clamp();
        Ok(settings)
    }

    /// Load settings from the file named by `FACECAST_CONFIG`, or defaults
    /// when the variable is unset. A named-but-broken file is an error.
    pub fn load() -> Result<Self, String> {
        match std::env::var("FACECAST_CONFIG") {
            Ok(path) => Self::load_from_file(Path::new(&path)),
            Err(_) => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api_port, 8765);
        assert_eq!(settings.camera_index, 0);
        assert_eq!(settings.process_fps, 30);
        assert_eq!(settings.virtualcam_path, "/dev/video10");
        assert_eq!(settings.virtualcam_width, 1280);
        assert_eq!(settings.virtualcam_height, 720);
        assert_eq!(settings.jpeg_quality, 70);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"api_port": 9000}"#).unwrap();
        assert_eq!(settings.api_port, 9000);
        assert_eq!(settings.process_fps, 30);
        assert_eq!(settings.virtualcam_path, "/dev/video10");
    }

    #[test]
    fn test_clamping() {
        let mut settings = Settings::default();
        settings.process_fps = 500;
        settings.jpeg_quality = 0;
        settings.clamp();
        assert_eq!(settings.process_fps, 120);
        assert_eq!(settings.jpeg_quality, 1);
    }

    #[test]
    fn test_clamping_bounds_virtualcam_dimensions() {
        let mut settings = Settings::default();
        settings.virtualcam_width = u32::MAX;
        settings.virtualcam_height = 0;
        settings.clamp();
        assert_eq!(settings.virtualcam_width, 7680);
        assert_eq!(settings.virtualcam_height, 1);
        // Capped size keeps width * height * 3 well inside u32
        assert!(settings
            .virtualcam_width
            .checked_mul(settings.virtualcam_height * 3)
            .is_some());
    }
}
