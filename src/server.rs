use crate::config::ServerConfig;
use crate::protocol::{ClientCommand, ServerEvent, StatusSnapshot, StreamPhase};
use crate::stream::session::SessionManager;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Json, Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub config: Arc<ServerConfig>,
}

/// Build the HTTP router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(handle_websocket))
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Current phase, device table and activity feed (HTTP endpoint)
async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.sessions.status())
}

/// Handle WebSocket upgrade
pub async fn handle_websocket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.sessions.subscribe();

    info!("New viewer connected");

    // Current device table first so the viewer renders without waiting
    let snapshot = ServerEvent::DeviceStatus {
        devices: state.sessions.device_status(),
    };
    if send_event(&mut sender, &snapshot).await.is_err() {
        return;
    }

    maybe_autostart(&state);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Slow viewer; drop the backlog and resume from live
                    warn!("viewer lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => {
                let Some(msg) = incoming else { break };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => {
                        // Parse incoming command
                        let command: ClientCommand = match serde_json::from_str(&text) {
                            Ok(command) => command,
                            Err(e) => {
                                error!("Failed to parse command: {}", e);
                                let reply = ServerEvent::ErrorMessage {
                                    message: format!("Invalid command format: {}", e),
                                };
                                if send_event(&mut sender, &reply).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        // Handle the command; replies go to this viewer only
                        if let Some(reply) = handle_command(command, &state).await {
                            if send_event(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Viewer disconnected");
                        break;
                    }
                    Message::Ping(data) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Viewer connection terminated");
}

/// Handle a viewer command and return an optional direct reply
async fn handle_command(command: ClientCommand, state: &AppState) -> Option<ServerEvent> {
    match command {
        ClientCommand::StartSession { recording } => {
            let path = recording
                .map(PathBuf::from)
                .or_else(|| state.config.recording.clone());
            match path {
                Some(path) => {
                    state.sessions.start(path);
                    None
                }
                None => Some(ServerEvent::ErrorMessage {
                    message: "No recording is configured".to_string(),
                }),
            }
        }

        ClientCommand::StopSession => {
            if state.sessions.stop().await {
                None
            } else {
                Some(ServerEvent::ErrorMessage {
                    message: "No streaming session is running".to_string(),
                })
            }
        }

        ClientCommand::SetDevice { device, .. } => {
            info!("Manual control attempt for {} rejected", device);
            state.sessions.reject_manual_control();
            None
        }
    }
}

/// Start the configured recording when a viewer finds the server idle
fn maybe_autostart(state: &AppState) {
    if !state.config.auto_start || state.sessions.is_running() {
        return;
    }
    // A failed session stays failed; connecting again must not retry the load
    if !matches!(state.sessions.status().phase, StreamPhase::Idle) {
        return;
    }
    let Some(path) = state.config.recording.clone() else {
        return;
    };

    info!("Viewer connected with no active session, starting stream");
    state.sessions.start(path);
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::engine::StreamSettings;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            sessions: Arc::new(SessionManager::new(StreamSettings::default())),
            config: Arc::new(ServerConfig {
                port: 0,
                bind_addr: "127.0.0.1".to_string(),
                recording: None,
                auto_start: false,
                stream: StreamSettings::default(),
            }),
        }
    }

    #[tokio::test]
    async fn health_endpoint_replies_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn status_endpoint_reports_idle_state() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["phase"], "idle");
        assert_eq!(value["devices"].as_object().unwrap().len(), 3);
        assert_eq!(value["session_id"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/devices")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
