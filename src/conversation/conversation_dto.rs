use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{conversation::LastMessage, user::UserProjection};

/// A conversation as seen by one of its participants.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: Uuid,
    pub other_participant: UserProjection,
    pub last_message: LastMessage,
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
}
