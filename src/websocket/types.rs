use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::Message;

/// Server-to-client frames: `{"event": "<name>", "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Every user with a live connection; sent on each presence change.
    GetOnlineUsers(Vec<Uuid>),
    NewMessage(Message),
    MessagesSeen(MessagesSeenPayload),
    Error(ErrorPayload),
    Ping,
    Pong,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesSeenPayload {
    pub conversation_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

// Client-to-server frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    MarkMessagesAsSeen(MarkSeenPayload),
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkSeenPayload {
    pub conversation_id: Uuid,
    /// The other participant, whose connection gets the receipt.
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_names_on_the_wire() {
        let online = serde_json::to_value(ServerEvent::GetOnlineUsers(vec![])).unwrap();
        assert_eq!(online["event"], "getOnlineUsers");
        assert_eq!(online["data"], json!([]));

        let conversation_id = Uuid::new_v4();
        let seen = serde_json::to_value(ServerEvent::MessagesSeen(MessagesSeenPayload {
            conversation_id,
        }))
        .unwrap();
        assert_eq!(seen["event"], "messagesSeen");
        assert_eq!(seen["data"]["conversationId"], conversation_id.to_string());

        let ping = serde_json::to_value(ServerEvent::Ping).unwrap();
        assert_eq!(ping, json!({ "event": "ping" }));
    }

    #[test]
    fn test_parse_mark_seen_from_client() {
        let conversation_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let frame = json!({
            "event": "markMessagesAsSeen",
            "data": { "conversationId": conversation_id, "userId": user_id }
        })
        .to_string();

        let event: ClientEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(
            event,
            ClientEvent::MarkMessagesAsSeen(MarkSeenPayload {
                conversation_id,
                user_id
            })
        );
    }

    #[test]
    fn test_unknown_client_event_is_rejected() {
        let frame = json!({ "event": "typing", "data": {} }).to_string();
        assert!(serde_json::from_str::<ClientEvent>(&frame).is_err());
    }
}
