use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    conversation::{Conversation, ConversationStore, LastMessage, ParticipantPair},
    error::{AppError, Result},
    message::{Message, MessageStore},
    user::{NewUser, User, UserProjection, UserStore},
};

/// In-process implementation of every store, for development and tests.
/// Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    conversations: HashMap<Uuid, Conversation>,
    pairs: HashMap<ParticipantPair, Uuid>,
    // Per conversation, in insertion order
    messages: HashMap<Uuid, Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn unseen_in(&self, conversation_id: Uuid, user_id: Uuid) -> i64 {
        self.messages
            .get(&conversation_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| !m.seen && m.sender_id != user_id)
                    .count() as i64
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, new_user: NewUser) -> Result<User> {
        let mut inner = self.inner.write().await;

        let taken = inner
            .users
            .values()
            .any(|u| u.username == new_user.username || u.email == new_user.email);
        if taken {
            return Err(AppError::Conflict(
                "Username or email already taken".to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            profile_picture: None,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_projections(&self, ids: &[Uuid]) -> Result<Vec<UserProjection>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.users.get(id))
            .map(UserProjection::from)
            .collect())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<Conversation>> {
        if user_a == user_b {
            return Ok(None);
        }

        let inner = self.inner.read().await;
        Ok(inner
            .pairs
            .get(&ParticipantPair::new(user_a, user_b))
            .and_then(|id| inner.conversations.get(id))
            .cloned())
    }

    async fn find_by_id(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        Ok(self
            .inner
            .read()
            .await
            .conversations
            .get(&conversation_id)
            .cloned())
    }

    async fn create_conversation(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        initial_summary: LastMessage,
    ) -> Result<Conversation> {
        if user_a == user_b {
            return Err(AppError::BadRequest(
                "A conversation needs two distinct participants".to_string(),
            ));
        }

        let pair = ParticipantPair::new(user_a, user_b);
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.pairs.get(&pair).and_then(|id| inner.conversations.get(id)) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            participants: pair,
            last_message: initial_summary,
            created_at: now,
            updated_at: now,
        };
        inner.pairs.insert(pair, conversation.id);
        inner.conversations.insert(conversation.id, conversation.clone());

        Ok(conversation)
    }

    async fn update_summary(&self, conversation_id: Uuid, summary: LastMessage) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
            conversation.last_message = summary;
            conversation.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let inner = self.inner.read().await;
        let mut conversations: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.participants.contains(user_id))
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(conversations)
    }

    async fn mark_seen_for_conversation(&self, conversation_id: Uuid, viewer_id: Uuid) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.conversations.get_mut(&conversation_id) {
            Some(conversation) if conversation.last_message.sender_id != viewer_id => {
                conversation.last_message.seen = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        text: Option<String>,
        img: Option<String>,
    ) -> Result<Message> {
        let mut inner = self.inner.write().await;
        let log = inner.messages.entry(conversation_id).or_default();

        // Wall clock can step back; the log must not
        let now = Utc::now();
        let created_at: DateTime<Utc> = match log.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            text,
            img,
            seen: false,
            created_at,
        };
        log.push(message.clone());

        Ok(message)
    }

    async fn list_for_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        Ok(self
            .inner
            .read()
            .await
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_seen(&self, conversation_id: Uuid, except_sender_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut updated = 0;

        if let Some(messages) = inner.messages.get_mut(&conversation_id) {
            for message in messages
                .iter_mut()
                .filter(|m| !m.seen && m.sender_id != except_sender_id)
            {
                message.seen = true;
                updated += 1;
            }
        }

        Ok(updated)
    }

    async fn count_unseen(&self, user_id: Uuid) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .values()
            .filter(|c| c.participants.contains(user_id))
            .map(|c| inner.unseen_in(c.id, user_id))
            .sum())
    }

    async fn count_unseen_in_conversation(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64> {
        Ok(self.inner.read().await.unseen_in(conversation_id, user_id))
    }
}
