//! facecast: webcam face styling service
//!
//! Captures webcam frames, detects the face, applies the selected style, and
//! fans the result out to a v4l2loopback virtual camera and to WebSocket
//! viewers, all driven by an HTTP/WebSocket control surface.

use std::path::Path;
use std::sync::Arc;

use facecast::camera::CameraCapture;
use facecast::detect::{FaceDetector, OnnxFaceDetector};
use facecast::effects::StyleEngine;
use facecast::output::{Broadcaster, VirtualCamera};
use facecast::pipeline::PipelineController;
use facecast::settings::Settings;
use facecast::telemetry;

#[tokio::main]
async fn main() {
    if let Err(e) = telemetry::init_logging_default() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    log::info!(
        "Starting facecast (camera {}, api port {})",
        settings.camera_index,
        settings.api_port
    );

    let model_path = Path::new(&settings.model_path);
    let detector: Option<Box<dyn FaceDetector>> = if model_path.exists() {
        match OnnxFaceDetector::load(model_path) {
            Ok(detector) => {
                log::info!("Face detector loaded from {}", settings.model_path);
                Some(Box::new(detector))
            }
            Err(e) => {
                log::warn!("Face detector unavailable: {}", e);
                None
            }
        }
    } else {
        log::warn!(
            "Face detector model not found at {}, styles will pass frames through",
            settings.model_path
        );
        None
    };

    let source = Arc::new(CameraCapture::new(settings.camera_index));
    let engine = Arc::new(StyleEngine::new());
    let virtualcam = Arc::new(VirtualCamera::new(
        &settings.virtualcam_path,
        settings.virtualcam_width,
        settings.virtualcam_height,
        settings.virtualcam_fps,
    ));
    let broadcaster = Arc::new(Broadcaster::new(settings.jpeg_quality));

    let controller = Arc::new(PipelineController::new(
        source,
        detector,
        engine,
        virtualcam,
        broadcaster,
        settings.process_fps,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let server_controller = controller.clone();
    let server = tokio::spawn(async move {
        if let Err(e) =
            facecast::api::run_server(settings.api_port, server_controller, shutdown_rx).await
        {
            log::error!("API server error: {}", e);
        }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutdown signal received"),
        Err(e) => log::error!("Failed to listen for shutdown signal: {}", e),
    }

    let _ = shutdown_tx.send(true);
    let _ = server.await;

    let stop_controller = controller.clone();
    let _ = tokio::task::spawn_blocking(move || stop_controller.stop()).await;

    log::info!("facecast stopped");
}
