use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use super::message_models::Message;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a new unseen message stamped with the current time.
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        text: Option<String>,
        img: Option<String>,
    ) -> Result<Message>;

    /// Full history, oldest first. Messages with equal timestamps keep
    /// insertion order.
    async fn list_for_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>>;

    /// Flips every unseen message not sent by `except_sender_id` to seen.
    /// Returns how many changed; a repeat call returns 0.
    async fn mark_seen(&self, conversation_id: Uuid, except_sender_id: Uuid) -> Result<u64>;

    /// Unseen messages addressed to `user_id` across all of their conversations.
    async fn count_unseen(&self, user_id: Uuid) -> Result<i64>;

    async fn count_unseen_in_conversation(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64>;
}
