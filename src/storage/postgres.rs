use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::{
    conversation::{Conversation, ConversationStore, LastMessage, ParticipantPair},
    error::{AppError, Result},
    message::{Message, MessageStore},
    user::{NewUser, User, UserProjection, UserStore},
};

const CONVERSATION_COLUMNS: &str = "id, participant_a, participant_b, last_message_text, \
     last_message_sender, last_message_img, last_message_seen, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, text, img, seen, created_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    participant_a: Uuid,
    participant_b: Uuid,
    last_message_text: Option<String>,
    last_message_sender: Uuid,
    last_message_img: Option<String>,
    last_message_seen: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            participants: ParticipantPair::new(row.participant_a, row.participant_b),
            last_message: LastMessage {
                text: row.last_message_text,
                sender_id: row.last_message_sender,
                img: row.last_message_img,
                seen: row.last_message_seen,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, new_user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, name, username, email, password_hash)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                AppError::Conflict("Username or email already taken".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_projections(&self, ids: &[Uuid]) -> Result<Vec<UserProjection>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<_, UserProjection>(
            "SELECT id, name, username, profile_picture FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn find_conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<Conversation>> {
        if user_a == user_b {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE $1 IN (participant_a, participant_b)
               AND $2 IN (participant_a, participant_b)"
        ))
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Conversation::from))
    }

    async fn find_by_id(&self, conversation_id: Uuid) -> Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Conversation::from))
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

        let inserted = sqlx::query_as::<_, ConversationRow>(&format!(
            "INSERT INTO conversations
                (id, participant_a, participant_b, last_message_text,
                 last_message_sender, last_message_img, last_message_seen)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (participant_a, participant_b) DO NOTHING
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(pair.low())
        .bind(pair.high())
        .bind(&initial_summary.text)
        .bind(initial_summary.sender_id)
        .bind(&initial_summary.img)
        .bind(initial_summary.seen)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(row.into()),
            // Lost the race: another send created it first
            None => self
                .find_conversation(user_a, user_b)
                .await?
                .ok_or_else(|| AppError::Storage("Conversation insert conflicted but no row was found".to_string())),
        }
    }

    async fn update_summary(&self, conversation_id: Uuid, summary: LastMessage) -> Result<()> {
        sqlx::query(
            "UPDATE conversations
             SET last_message_text = $2,
                 last_message_sender = $3,
                 last_message_img = $4,
                 last_message_seen = $5,
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(&summary.text)
        .bind(summary.sender_id)
        .bind(&summary.img)
        .bind(summary.seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations
             WHERE participant_a = $1 OR participant_b = $1
             ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    async fn mark_seen_for_conversation(&self, conversation_id: Uuid, viewer_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE conversations
             SET last_message_seen = true
             WHERE id = $1 AND last_message_sender <> $2",
        )
        .bind(conversation_id)
        .bind(viewer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        text: Option<String>,
        img: Option<String>,
    ) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (id, conversation_id, sender_id, text, img)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(text)
        .bind(img)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn list_for_conversation(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC, seq ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_seen(&self, conversation_id: Uuid, except_sender_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE messages
             SET seen = true
             WHERE conversation_id = $1 AND sender_id <> $2 AND seen = false",
        )
        .bind(conversation_id)
        .bind(except_sender_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unseen(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m
             JOIN conversations c ON c.id = m.conversation_id
             WHERE (c.participant_a = $1 OR c.participant_b = $1)
               AND m.sender_id <> $1
               AND m.seen = false",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn count_unseen_in_conversation(&self, conversation_id: Uuid, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = $1 AND sender_id <> $2 AND seen = false",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(store: &PgStore, username: &str) -> User {
        store
            .create(NewUser {
                name: username.to_uppercase(),
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    fn summary(sender_id: Uuid) -> LastMessage {
        LastMessage {
            text: Some("hi".to_string()),
            sender_id,
            img: None,
            seen: false,
        }
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn test_concurrent_creates_converge(pool: PgPool) {
        let store = PgStore::new(pool);
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;

        let (first, second) = tokio::join!(
            store.create_conversation(a.id, b.id, summary(a.id)),
            store.create_conversation(b.id, a.id, summary(b.id)),
        );

        assert_eq!(first.unwrap().id, second.unwrap().id);
        assert_eq!(store.list_for_user(a.id).await.unwrap().len(), 1);
        assert_eq!(store.list_for_user(b.id).await.unwrap().len(), 1);

        let found = store.find_conversation(b.id, a.id).await.unwrap();
        assert!(found.is_some());
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn test_history_keeps_insertion_order(pool: PgPool) {
        let store = PgStore::new(pool);
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;
        let conversation = store
            .create_conversation(a.id, b.id, summary(a.id))
            .await
            .unwrap();

        for i in 0..20 {
            let sender = if i % 3 == 0 { b.id } else { a.id };
            store
                .append(conversation.id, sender, Some(i.to_string()), None)
                .await
                .unwrap();
        }

        let history = store.list_for_conversation(conversation.id).await.unwrap();
        let texts: Vec<String> = history.iter().filter_map(|m| m.text.clone()).collect();
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(texts, expected);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn test_mark_seen_counts_and_summary(pool: PgPool) {
        let store = PgStore::new(pool);
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;
        let conversation = store
            .create_conversation(a.id, b.id, summary(a.id))
            .await
            .unwrap();

        store.append(conversation.id, a.id, Some("1".into()), None).await.unwrap();
        store.append(conversation.id, a.id, Some("2".into()), None).await.unwrap();
        store.append(conversation.id, b.id, Some("3".into()), None).await.unwrap();

        assert_eq!(store.count_unseen(b.id).await.unwrap(), 2);
        assert_eq!(store.mark_seen(conversation.id, b.id).await.unwrap(), 2);
        assert_eq!(store.mark_seen(conversation.id, b.id).await.unwrap(), 0);
        assert_eq!(
            store
                .count_unseen_in_conversation(conversation.id, a.id)
                .await
                .unwrap(),
            1
        );

        // The sender of the summary never marks it seen
        assert!(!store.mark_seen_for_conversation(conversation.id, a.id).await.unwrap());
        assert!(store.mark_seen_for_conversation(conversation.id, b.id).await.unwrap());
        let current = ConversationStore::find_by_id(&store, conversation.id)
            .await
            .unwrap()
            .unwrap();
        assert!(current.last_message.seen);
    }
}
