use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub text: Option<String>,
    pub img: Option<String>,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_from(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id
    }
}
