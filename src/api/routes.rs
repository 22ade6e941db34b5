//! API route definitions

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::RgbImage;

use super::types::*;
use super::websocket::ws_handler;
use super::ApiState;

/// Create the API router with all endpoints
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/start", post(start_handler))
        .route("/stop", post(stop_handler))
        .route("/generate", post(generate_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Service banner
async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "facecast",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// Start the capture/processing pipeline.
async fn start_handler(State(state): State<ApiState>) -> Json<ActionResponse> {
    let controller = state.clone();
    let result = tokio::task::spawn_blocking(move || controller.start())
        .await
        .map_err(|e| format!("Start task panicked: {}", e))
        .and_then(|r| r);

    let response = match result {
        Ok(()) => ActionResponse::ok("Camera started"),
        Err(e) => ActionResponse::error(e),
    };
    push_status(&state, &response.message);
    Json(response)
}

/// Stop the pipeline and release the camera.
async fn stop_handler(State(state): State<ApiState>) -> Json<ActionResponse> {
    let controller = state.clone();
    let result = tokio::task::spawn_blocking(move || controller.stop()).await;

    let response = match result {
        Ok(()) => ActionResponse::ok("Camera stopped"),
        Err(e) => ActionResponse::error(format!("Stop task panicked: {}", e)),
    };
    push_status(&state, &response.message);
    Json(response)
}

/// Select a style, optionally with an uploaded reference image.
async fn generate_handler(
    State(state): State<ApiState>,
    Json(request): Json<GenerateRequest>,
) -> Json<ActionResponse> {
    Json(apply_style(&state, &request.style, request.image.as_deref()))
}

/// Shared by the REST and WebSocket surfaces: decode any reference image
/// and install the selection. A bad image rejects the whole request rather
/// than silently switching styles without its asset.
pub(super) fn apply_style(
    state: &ApiState,
    style: &str,
    image: Option<&str>,
) -> ActionResponse {
    let reference = match image.map(decode_reference).transpose() {
        Ok(reference) => reference,
        Err(e) => return ActionResponse::error(e),
    };

    state.style_engine().set_style(style, reference);
    ActionResponse::ok(format!("Style set to {}", style))
}

/// Decode a base64 reference image, tolerating a `data:` URL wrapper.
fn decode_reference(encoded: &str) -> Result<RgbImage, String> {
    let payload = match encoded.split_once(";base64,") {
        Some((_, rest)) => rest,
        None => encoded,
    };
    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| format!("Invalid base64 image: {}", e))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| format!("Unreadable reference image: {}", e))?;
    Ok(img.to_rgb8())
}

/// Push the current pipeline status to every WebSocket viewer.
pub(super) fn push_status(state: &ApiState, message: &str) {
    let status = StatusMessage::new(state.status(), message);
    state.broadcaster().broadcast_status(status.to_json());
}
