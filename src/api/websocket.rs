//! WebSocket handler for viewers and control
//!
//! Each connection subscribes to the frame broadcaster, receives an initial
//! status message, then gets processed frames as binary JPEG messages and
//! status updates as JSON text. Incoming text messages carry the same
//! control actions as the REST surface.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use super::routes::{apply_style, push_status};
use super::types::{ControlAction, StatusMessage};
use super::ApiState;
use crate::output::Outbound;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: ApiState) {
    let (mut sender, mut receiver) = socket.split();
    let (viewer_id, mut rx) = state.broadcaster().subscribe();

    // Initial status so the client can render its controls immediately
    let initial = StatusMessage::new(state.status(), "Connected");
    if sender.send(Message::Text(initial.to_json())).await.is_err() {
        state.broadcaster().unsubscribe(viewer_id);
        return;
    }

    tracing::info!("WebSocket viewer {} connected", viewer_id);

    // Forward broadcast traffic to this socket
    let send_task = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let message = match outbound {
                Outbound::Status(json) => Message::Text(json),
                Outbound::Frame(bytes) => Message::Binary(bytes.to_vec()),
            };
            if sender.send(message).await.is_err() {
                break; // Client disconnected
            }
        }
    });

    // Handle incoming control actions
    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    handle_action(&recv_state, viewer_id, &text).await;
                }
                Ok(Message::Close(_)) => {
                    tracing::info!("WebSocket viewer {} requested close", viewer_id);
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket viewer {} receive error: {}", viewer_id, e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Either side finishing means the connection is done
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.broadcaster().unsubscribe(viewer_id);
    tracing::info!("WebSocket viewer {} disconnected", viewer_id);
}

/// Parse and execute one control action from a viewer.
async fn handle_action(state: &ApiState, viewer_id: u64, text: &str) {
    let action = match serde_json::from_str::<ControlAction>(text) {
        Ok(action) => action,
        Err(e) => {
            tracing::debug!("Viewer {} sent unparseable action: {}", viewer_id, e);
            reply(state, viewer_id, "Malformed action");
            return;
        }
    };

    match action {
        ControlAction::StartCamera => {
            let controller = state.clone();
            let result = tokio::task::spawn_blocking(move || controller.start()).await;
            let message = match result {
                Ok(Ok(())) => "Camera started".to_string(),
                Ok(Err(e)) => e,
                Err(e) => format!("Start task panicked: {}", e),
            };
            push_status(state, &message);
        }
        ControlAction::StopCamera => {
            let controller = state.clone();
            let _ = tokio::task::spawn_blocking(move || controller.stop()).await;
            push_status(state, "Camera stopped");
        }
        ControlAction::GenerateMask { style, image } => {
            let response = apply_style(state, &style, image.as_deref());
            push_status(state, &response.message);
        }
        ControlAction::SetStyle { style } => {
            let response = apply_style(state, &style, None);
            push_status(state, &response.message);
        }
        ControlAction::Unknown => {
            reply(state, viewer_id, "Unknown action");
        }
    }
}

/// Status reply to a single viewer, leaving the rest untouched.
fn reply(state: &ApiState, viewer_id: u64, message: &str) {
    let status = StatusMessage::new(state.status(), message);
    state
        .broadcaster()
        .send_to(viewer_id, Outbound::Status(status.to_json()));
}
