use reqwest::StatusCode;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("No conversation is open")]
    NoConversation,

    #[error("A message is already being sent")]
    SendInProgress,

    #[error("Live connection closed")]
    Closed,
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}
