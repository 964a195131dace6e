use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use super::conversation_models::{Conversation, LastMessage};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Matches whichever order the two ids are given in.
    async fn find_conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<Conversation>>;

    async fn find_by_id(&self, conversation_id: Uuid) -> Result<Option<Conversation>>;

    /// Creates the conversation for the pair. If a concurrent caller created it
    /// first, the existing record is returned instead of a duplicate.
    async fn create_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        initial_summary: LastMessage,
    ) -> Result<Conversation>;

    /// Overwrites the last-message summary and bumps `updated_at`.
    async fn update_summary(&self, conversation_id: Uuid, summary: LastMessage) -> Result<()>;

    /// Newest activity first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>>;

    /// Flags the summary seen, but only while its sender is not `viewer_id`.
    /// The check and the write happen in one step so a message the viewer
    /// sends concurrently is never marked seen on their behalf. Returns whether
    /// the flag was set.
    async fn mark_seen_for_conversation(&self, conversation_id: Uuid, viewer_id: Uuid) -> Result<bool>;
}
