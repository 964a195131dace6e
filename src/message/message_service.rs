use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    conversation::{ConversationStore, ConversationView, LastMessage},
    error::{AppError, Result},
    message::{message_dto::SendMessageRequest, message_models::Message, MessageStore},
    user::UserStore,
    websocket::{DeliveryChannel, MarkSeenPayload},
};

#[derive(Clone)]
pub struct MessageService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserStore>,
    delivery: DeliveryChannel,
}

impl MessageService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserStore>,
        delivery: DeliveryChannel,
    ) -> Self {
        Self {
            conversations,
            messages,
            users,
            delivery,
        }
    }

    pub async fn send_message(&self, sender_id: Uuid, payload: SendMessageRequest) -> Result<Message> {
        payload.validate()?;

        let recipient_id = payload
            .recipient_id
            .ok_or_else(|| AppError::BadRequest("recipientId is required".to_string()))?;

        if recipient_id == sender_id {
            return Err(AppError::BadRequest("You can't message yourself".to_string()));
        }

        self.users
            .find_by_id(recipient_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipient not found".to_string()))?;

        let text = non_empty(payload.message);
        let img = non_empty(payload.img);
        let summary = LastMessage {
            text: text.clone(),
            sender_id,
            img: img.clone(),
            seen: false,
        };

        let conversation = match self
            .conversations
            .find_conversation(sender_id, recipient_id)
            .await?
        {
            Some(conversation) => conversation,
            None => {
                tracing::debug!(
                    "Starting conversation between {} and {}",
                    sender_id,
                    recipient_id
                );
                self.conversations
                    .create_conversation(sender_id, recipient_id, summary.clone())
                    .await?
            }
        };

        // Not transactional: a failure after one write leaves the summary
        // stale, never the history
        let (message, ()) = tokio::try_join!(
            self.messages.append(conversation.id, sender_id, text, img),
            self.conversations.update_summary(conversation.id, summary),
        )?;

        let pushed = self.delivery.push_new_message(recipient_id, sender_id, &message);
        tracing::debug!("Message {} stored, {} live pushes", message.id, pushed);

        Ok(message)
    }

    pub async fn get_history(&self, user_id: Uuid, other_user_id: Uuid) -> Result<Vec<Message>> {
        let conversation = self
            .conversations
            .find_conversation(user_id, other_user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        self.messages.list_for_conversation(conversation.id).await
    }

    pub async fn get_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationView>> {
        let conversations = self.conversations.list_for_user(user_id).await?;

        let other_ids: Vec<Uuid> = conversations
            .iter()
            .filter_map(|conversation| conversation.participants.other(user_id))
            .collect();
        let profiles: HashMap<Uuid, _> = self
            .users
            .find_projections(&other_ids)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();

        let mut views = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let Some(other_id) = conversation.participants.other(user_id) else {
                continue;
            };
            let Some(other_participant) = profiles.get(&other_id).cloned() else {
                tracing::warn!(
                    "Conversation {} references unknown user {}",
                    conversation.id,
                    other_id
                );
                continue;
            };
            let unread_count = self
                .messages
                .count_unseen_in_conversation(conversation.id, user_id)
                .await?;

            views.push(ConversationView {
                id: conversation.id,
                other_participant,
                last_message: conversation.last_message,
                unread_count,
                updated_at: conversation.updated_at,
            });
        }

        Ok(views)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        self.messages.count_unseen(user_id).await
    }

    /// Handles a `markMessagesAsSeen` event sent by `viewer_id` on
    /// `origin_connection_id`.
    pub async fn mark_conversation_seen(
        &self,
        viewer_id: Uuid,
        payload: MarkSeenPayload,
        origin_connection_id: Uuid,
    ) -> Result<u64> {
        let conversation = self
            .conversations
            .find_by_id(payload.conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        let other_user_id = conversation.participants.other(viewer_id).ok_or_else(|| {
            AppError::Forbidden("You are not a participant of this conversation".to_string())
        })?;

        if other_user_id != payload.user_id {
            tracing::warn!(
                "markMessagesAsSeen from {} named {} but the other participant is {}",
                viewer_id,
                payload.user_id,
                other_user_id
            );
        }

        let updated = self.messages.mark_seen(conversation.id, viewer_id).await?;

        // The preview only counts as seen when the viewer is its recipient;
        // the store re-checks the sender against the current summary
        self.conversations
            .mark_seen_for_conversation(conversation.id, viewer_id)
            .await?;

        self.delivery
            .push_messages_seen(other_user_id, origin_connection_id, conversation.id);

        tracing::debug!(
            "User {} saw {} messages in {}",
            viewer_id,
            updated,
            conversation.id
        );

        Ok(updated)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
