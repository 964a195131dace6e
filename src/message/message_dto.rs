use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(required(message = "recipientId is required"))]
    pub recipient_id: Option<Uuid>,
    /// May be empty when an image is attached.
    #[validate(required(message = "message is required"))]
    pub message: Option<String>,
    pub img: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_recipient_is_rejected() {
        let request: SendMessageRequest =
            serde_json::from_value(serde_json::json!({ "message": "hi" })).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_missing_message_is_rejected() {
        let request: SendMessageRequest =
            serde_json::from_value(serde_json::json!({ "recipientId": Uuid::new_v4() })).unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_empty_text_with_image_is_accepted() {
        let request: SendMessageRequest = serde_json::from_value(serde_json::json!({
            "recipientId": Uuid::new_v4(),
            "message": "",
            "img": "https://cdn.example.com/a.png"
        }))
        .unwrap();
        assert!(request.validate().is_ok());
    }
}
