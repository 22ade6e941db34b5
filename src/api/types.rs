//! API request/response types
//!
//! These types are used for JSON serialization in API endpoints and over
//! the WebSocket.

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineStatus;

/// Generic action outcome for the REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Body of `POST /generate`: a style name plus an optional base64-encoded
/// reference image (raw base64 or a `data:` URL).
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub style: String,
    #[serde(default)]
    pub image: Option<String>,
}

/// Status payload pushed to WebSocket viewers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub camera_active: bool,
    pub virtualcam_active: bool,
    pub detector_available: bool,
    pub message: String,
}

impl StatusMessage {
    pub fn new(status: PipelineStatus, message: impl Into<String>) -> Self {
        Self {
            camera_active: status.camera_active,
            virtualcam_active: status.virtualcam_active,
            detector_available: status.detector_available,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Control actions accepted over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    StartCamera,
    StopCamera,
    GenerateMask {
        style: String,
        #[serde(default)]
        image: Option<String>,
    },
    SetStyle {
        style: String,
    },
    /// Any action name this build does not understand.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_action_parsing() {
        let action: ControlAction =
            serde_json::from_str(r#"{"action": "start_camera"}"#).unwrap();
        assert!(matches!(action, ControlAction::StartCamera));

        let action: ControlAction =
            serde_json::from_str(r#"{"action": "set_style", "style": "Anime"}"#).unwrap();
        let ControlAction::SetStyle { style } = action else {
            panic!("expected set_style");
        };
        assert_eq!(style, "Anime");
    }

    #[test]
    fn test_generate_mask_image_is_optional() {
        let action: ControlAction =
            serde_json::from_str(r#"{"action": "generate_mask", "style": "Cinematic"}"#).unwrap();
        let ControlAction::GenerateMask { style, image } = action else {
            panic!("expected generate_mask");
        };
        assert_eq!(style, "Cinematic");
        assert!(image.is_none());
    }

    #[test]
    fn test_unknown_action_parses_to_unknown() {
        let action: ControlAction =
            serde_json::from_str(r#"{"action": "reticulate_splines"}"#).unwrap();
        assert!(matches!(action, ControlAction::Unknown));
    }

    #[test]
    fn test_status_message_serializes_all_fields() {
        let msg = StatusMessage {
            camera_active: true,
            virtualcam_active: false,
            detector_available: true,
            message: "running".to_string(),
        };
        let json = msg.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["camera_active"], true);
        assert_eq!(value["virtualcam_active"], false);
        assert_eq!(value["detector_available"], true);
        assert_eq!(value["message"], "running");
    }
}
