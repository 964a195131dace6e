use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    conversation::ConversationView,
    error::Result,
    message::{
        message_dto::{SendMessageRequest, UnreadCountResponse},
        message_models::Message,
    },
    middleware::AuthUser,
    state::AppState,
};

/// Send a message to another user
#[utoipa::path(
    post,
    path = "/api/v1/messages",
    tag = "messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent successfully", body = Message),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Recipient not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state
        .message_service
        .send_message(user_id, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Get the full message history with a specific user
#[utoipa::path(
    get,
    path = "/api/v1/messages/{other_user_id}",
    tag = "messages",
    params(
        ("other_user_id" = Uuid, Path, description = "Other participant of the conversation")
    ),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<Message>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Conversation not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(other_user_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let messages = state
        .message_service
        .get_history(user_id, other_user_id)
        .await?;

    Ok((StatusCode::OK, Json(messages)))
}

/// Get all conversations for the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/messages/conversations",
    tag = "messages",
    responses(
        (status = 200, description = "Conversations, newest first", body = Vec<ConversationView>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_conversations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse> {
    let conversations = state
        .message_service
        .get_conversations(user_id)
        .await?;

    Ok((StatusCode::OK, Json(conversations)))
}

/// Count unseen messages addressed to the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/messages/unread/count",
    tag = "messages",
    responses(
        (status = 200, description = "Unread message count", body = UnreadCountResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_unread_count(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse> {
    let count = state.message_service.unread_count(user_id).await?;

    Ok((StatusCode::OK, Json(UnreadCountResponse { count })))
}
