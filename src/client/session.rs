use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    conversation::{ConversationView, LastMessage},
    message::Message,
    user::UserProjection,
    websocket::{MessagesSeenPayload, ServerEvent},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoConversation,
    LoadingHistory,
    HistoryLoaded,
    AwaitingSend,
}

/// Work the session asks its driver to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    FetchHistory { other_user_id: Uuid },
    MarkSeen { conversation_id: Uuid, user_id: Uuid },
    Chime,
    RefreshUnreadCount,
}

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationPreview {
    pub conversation_id: Uuid,
    pub other_participant: UserProjection,
    pub last_message: LastMessage,
    pub updated_at: DateTime<Utc>,
}

impl From<ConversationView> for ConversationPreview {
    fn from(view: ConversationView) -> Self {
        Self {
            conversation_id: view.id,
            other_participant: view.other_participant,
            last_message: view.last_message,
            updated_at: view.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
struct OpenConversation {
    other: UserProjection,
    // None until the first message exists (a draft)
    conversation_id: Option<Uuid>,
}

/// Client-side view of one user's messaging screen.
///
/// Pure and synchronous: every input returns the effects the caller must run,
/// so the same session drives a live client and unit tests alike.
#[derive(Debug)]
pub struct ConversationSession {
    me: Uuid,
    state: SessionState,
    open: Option<OpenConversation>,
    messages: Vec<Message>,
    // Pushes received while the history request is in flight
    buffered: Vec<Message>,
    marked_seen: Option<Uuid>,
    previews: Vec<ConversationPreview>,
    online: HashSet<Uuid>,
    unread: i64,
    // Ids whose push or send result was already applied
    handled: HashSet<Uuid>,
}

impl ConversationSession {
    pub fn new(me: Uuid) -> Self {
        Self {
            me,
            state: SessionState::NoConversation,
            open: None,
            messages: Vec::new(),
            buffered: Vec::new(),
            marked_seen: None,
            previews: Vec::new(),
            online: HashSet::new(),
            unread: 0,
            handled: HashSet::new(),
        }
    }

    pub fn me(&self) -> Uuid {
        self.me
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn open_user(&self) -> Option<&UserProjection> {
        self.open.as_ref().map(|open| &open.other)
    }

    pub fn conversation_id(&self) -> Option<Uuid> {
        self.open.as_ref().and_then(|open| open.conversation_id)
    }

    pub fn previews(&self) -> &[ConversationPreview] {
        &self.previews
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.online.contains(&user_id)
    }

    pub fn online_users(&self) -> &HashSet<Uuid> {
        &self.online
    }

    pub fn unread_count(&self) -> i64 {
        self.unread
    }

    pub fn set_unread_count(&mut self, count: i64) {
        self.unread = count;
    }

    pub fn load_conversations(&mut self, views: Vec<ConversationView>) {
        self.previews = views.into_iter().map(ConversationPreview::from).collect();
        self.previews.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    /// Opens the conversation with `other`. A user with no conversation yet
    /// opens as an empty draft and nothing is fetched.
    pub fn select(&mut self, other: UserProjection) -> Vec<SessionEffect> {
        let conversation_id = self
            .previews
            .iter()
            .find(|p| p.other_participant.id == other.id)
            .map(|p| p.conversation_id);
        let other_user_id = other.id;

        self.open = Some(OpenConversation {
            other,
            conversation_id,
        });
        self.messages.clear();
        self.buffered.clear();
        self.marked_seen = None;

        match conversation_id {
            Some(_) => {
                self.state = SessionState::LoadingHistory;
                vec![SessionEffect::FetchHistory { other_user_id }]
            }
            None => {
                self.state = SessionState::HistoryLoaded;
                Vec::new()
            }
        }
    }

    pub fn close(&mut self) {
        self.open = None;
        self.messages.clear();
        self.buffered.clear();
        self.marked_seen = None;
        self.state = SessionState::NoConversation;
    }

    pub fn history_loaded(&mut self, other_user_id: Uuid, history: Vec<Message>) -> Vec<SessionEffect> {
        if !self.is_loading(other_user_id) {
            tracing::debug!("Dropping stale history for {}", other_user_id);
            return Vec::new();
        }

        let mut merged = history;
        for message in self.buffered.drain(..) {
            if !merged.iter().any(|m| m.id == message.id) {
                merged.push(message);
            }
        }
        merged.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        if let (Some(open), Some(first)) = (self.open.as_mut(), merged.first()) {
            open.conversation_id.get_or_insert(first.conversation_id);
        }
        self.messages = merged;
        self.state = SessionState::HistoryLoaded;

        self.mark_seen_if_needed().into_iter().collect()
    }

    /// The history request came back 404: the conversation is a draft.
    pub fn history_missing(&mut self, other_user_id: Uuid) {
        if !self.is_loading(other_user_id) {
            return;
        }

        if let Some(open) = self.open.as_mut() {
            open.conversation_id = None;
        }
        self.messages = std::mem::take(&mut self.buffered);
        self.state = SessionState::HistoryLoaded;
    }

    /// Returns false when a send is already in flight or nothing is open.
    pub fn begin_send(&mut self) -> bool {
        if self.state != SessionState::HistoryLoaded || self.open.is_none() {
            return false;
        }
        self.state = SessionState::AwaitingSend;
        true
    }

    pub fn send_completed(&mut self, message: Message) -> Vec<SessionEffect> {
        if self.state == SessionState::AwaitingSend {
            self.state = SessionState::HistoryLoaded;
        }

        let Some(open) = self.open.as_mut() else {
            return Vec::new();
        };
        open.conversation_id.get_or_insert(message.conversation_id);
        let other = open.other.clone();
        self.handled.insert(message.id);

        if open.conversation_id == Some(message.conversation_id) {
            self.push_unique(message.clone());
        }
        self.update_preview(&message, Some(other));

        Vec::new()
    }

    pub fn send_failed(&mut self) {
        if self.state == SessionState::AwaitingSend {
            self.state = SessionState::HistoryLoaded;
        }
    }

    pub fn apply(&mut self, event: ServerEvent) -> Vec<SessionEffect> {
        match event {
            ServerEvent::GetOnlineUsers(users) => {
                self.online = users.into_iter().collect();
                Vec::new()
            }
            ServerEvent::NewMessage(message) => self.on_new_message(message),
            ServerEvent::MessagesSeen(MessagesSeenPayload { conversation_id }) => {
                self.on_messages_seen(conversation_id)
            }
            ServerEvent::Error(payload) => {
                tracing::warn!("Server reported an error: {}", payload.message);
                Vec::new()
            }
            ServerEvent::Ping | ServerEvent::Pong => Vec::new(),
        }
    }

    fn on_new_message(&mut self, message: Message) -> Vec<SessionEffect> {
        if !self.handled.insert(message.id) {
            tracing::debug!("Ignoring repeated push of message {}", message.id);
            return Vec::new();
        }

        let mut effects = Vec::new();
        let foreign = !message.is_from(self.me);

        let is_open = match self.open.as_mut() {
            Some(open) if open.conversation_id == Some(message.conversation_id) => true,
            // The first reply to a draft carries the new conversation id
            Some(open) if open.conversation_id.is_none() && message.sender_id == open.other.id => {
                open.conversation_id = Some(message.conversation_id);
                true
            }
            _ => false,
        };
        let other = self.open_user().cloned().filter(|_| is_open);

        // Own messages enter the open view from the send result, never the push
        if is_open && foreign {
            if self.state == SessionState::LoadingHistory {
                if !self.buffered.iter().any(|m| m.id == message.id) {
                    self.buffered.push(message.clone());
                }
            } else {
                self.push_unique(message.clone());
                effects.extend(self.mark_seen_if_needed());
            }
        } else if !is_open && foreign {
            effects.push(SessionEffect::Chime);
        }

        self.update_preview(&message, other);

        if foreign {
            self.unread += 1;
        }

        effects
    }

    fn on_messages_seen(&mut self, conversation_id: Uuid) -> Vec<SessionEffect> {
        if self.conversation_id() == Some(conversation_id) {
            for message in self.messages.iter_mut().chain(self.buffered.iter_mut()) {
                message.seen = true;
            }
        }

        if let Some(preview) = self
            .previews
            .iter_mut()
            .find(|p| p.conversation_id == conversation_id)
        {
            preview.last_message.seen = true;
        }

        vec![SessionEffect::RefreshUnreadCount]
    }

    fn is_loading(&self, other_user_id: Uuid) -> bool {
        self.state == SessionState::LoadingHistory
            && self.open.as_ref().map(|open| open.other.id) == Some(other_user_id)
    }

    fn push_unique(&mut self, message: Message) {
        if !self.messages.iter().any(|m| m.id == message.id) {
            self.messages.push(message);
        }
    }

    /// At most one receipt per newest incoming message.
    fn mark_seen_if_needed(&mut self) -> Option<SessionEffect> {
        let open = self.open.as_ref()?;
        let conversation_id = open.conversation_id?;
        let last = self.messages.last()?;

        if last.is_from(self.me) || last.seen || self.marked_seen == Some(last.id) {
            return None;
        }

        self.marked_seen = Some(last.id);
        Some(SessionEffect::MarkSeen {
            conversation_id,
            user_id: open.other.id,
        })
    }

    fn update_preview(&mut self, message: &Message, other: Option<UserProjection>) {
        let summary = LastMessage {
            text: message.text.clone(),
            sender_id: message.sender_id,
            img: message.img.clone(),
            seen: message.seen,
        };

        let position = self
            .previews
            .iter()
            .position(|p| p.conversation_id == message.conversation_id);

        let preview = match (position, other) {
            (Some(index), _) => {
                let mut preview = self.previews.remove(index);
                preview.last_message = summary;
                preview.updated_at = message.created_at;
                preview
            }
            (None, Some(other_participant)) => ConversationPreview {
                conversation_id: message.conversation_id,
                other_participant,
                last_message: summary,
                updated_at: message.created_at,
            },
            (None, None) => {
                tracing::debug!(
                    "No preview for conversation {}; it appears on the next list refresh",
                    message.conversation_id
                );
                return;
            }
        };

        self.previews.insert(0, preview);
    }
}
