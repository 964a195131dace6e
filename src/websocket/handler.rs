use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware::AuthUser,
    state::AppState,
    websocket::types::{ClientEvent, ErrorPayload, ServerEvent},
};

#[derive(Debug, Deserialize)]
pub struct HandshakeParams {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

impl HandshakeParams {
    /// Browsers send the literal "undefined" before the profile has loaded.
    fn claimed_user(&self) -> Result<Option<Uuid>> {
        match self.user_id.as_deref() {
            None | Some("") | Some("undefined") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| AppError::BadRequest("Invalid userId".to_string())),
        }
    }
}

/// Live messaging channel.
///
/// Handles:
///  - presence (`getOnlineUsers` broadcast on connect/disconnect)
///  - `newMessage` pushes from the REST send path
///  - `markMessagesAsSeen` receipts, answered with `messagesSeen`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<HandshakeParams>,
) -> Result<Response> {
    if let Some(claimed) = params.claimed_user()? {
        if claimed != user_id {
            return Err(AppError::Forbidden(
                "userId does not match the authenticated user".to_string(),
            ));
        }
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user_id, state)))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, user_id: Uuid, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let registration = state.delivery.connect(user_id);
    let connection_id = registration.connection_id;
    let mut events = registration.events;

    // Task: send events from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Task: receive events from WebSocket
    let state_clone = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) =
                        process_client_event(&text, user_id, connection_id, &state_clone).await
                    {
                        tracing::warn!("Error processing client event from {}: {}", user_id, e);
                        state_clone.delivery.push_to_connection(
                            connection_id,
                            ServerEvent::Error(ErrorPayload {
                                message: client_error_message(&e),
                            }),
                        );
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Heartbeat task
    let heartbeat_delivery = state.delivery.clone();
    let period = state.config.ws_heartbeat;
    let mut heartbeat_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            if !heartbeat_delivery.push_to_connection(connection_id, ServerEvent::Ping) {
                break;
            }
        }
    });

    // Stop all tasks when any one finishes
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            heartbeat_task.abort();
        },
        _ = &mut recv_task => {
            send_task.abort();
            heartbeat_task.abort();
        },
        _ = &mut heartbeat_task => {
            send_task.abort();
            recv_task.abort();
        }
    }

    state.delivery.disconnect(user_id, connection_id);
}

async fn process_client_event(
    text: &str,
    user_id: Uuid,
    connection_id: Uuid,
    state: &AppState,
) -> Result<()> {
    let event: ClientEvent = serde_json::from_str(text)
        .map_err(|e| AppError::BadRequest(format!("Invalid event format: {}", e)))?;

    match event {
        ClientEvent::MarkMessagesAsSeen(payload) => {
            state
                .message_service
                .mark_conversation_seen(user_id, payload, connection_id)
                .await?;
        }

        ClientEvent::Ping => {
            state.delivery.push_to_connection(connection_id, ServerEvent::Pong);
        }
    }

    Ok(())
}

fn client_error_message(error: &AppError) -> String {
    match error.status_code() {
        axum::http::StatusCode::INTERNAL_SERVER_ERROR => "Internal server error.".to_string(),
        _ => error.to_string(),
    }
}
