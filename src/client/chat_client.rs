use std::collections::VecDeque;

use uuid::Uuid;

use super::{
    api::ApiClient,
    error::{ClientError, ClientResult},
    live::LiveConnection,
    session::{ConversationSession, SessionEffect},
};
use crate::{
    message::Message,
    user::UserResponse,
    websocket::{ClientEvent, MarkSeenPayload, ServerEvent},
};

/// A logged-in user: REST client, live socket and session state together.
pub struct ChatClient {
    api: ApiClient,
    live: LiveConnection,
    session: ConversationSession,
    user: UserResponse,
    chimes: usize,
}

impl ChatClient {
    pub async fn login(base_url: &str, username: &str, password: &str) -> ClientResult<Self> {
        let mut api = ApiClient::new(base_url);
        let auth = api.login(username, password).await?;
        Self::start(base_url, api, auth.user, &auth.token).await
    }

    pub async fn register(
        base_url: &str,
        name: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<Self> {
        let mut api = ApiClient::new(base_url);
        let auth = api.register(name, username, email, password).await?;
        Self::start(base_url, api, auth.user, &auth.token).await
    }

    async fn start(
        base_url: &str,
        api: ApiClient,
        user: UserResponse,
        token: &str,
    ) -> ClientResult<Self> {
        let live = LiveConnection::connect(base_url, user.id, token).await?;

        let mut session = ConversationSession::new(user.id);
        session.load_conversations(api.conversations().await?);
        session.set_unread_count(api.unread_count().await?);

        Ok(Self {
            api,
            live,
            session,
            user,
            chimes: 0,
        })
    }

    pub fn user(&self) -> &UserResponse {
        &self.user
    }

    pub fn session(&self) -> &ConversationSession {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// How many times the notification sound would have played.
    pub fn chimes(&self) -> usize {
        self.chimes
    }

    pub async fn refresh_conversations(&mut self) -> ClientResult<()> {
        let conversations = self.api.conversations().await?;
        self.session.load_conversations(conversations);
        Ok(())
    }

    /// Opens the conversation with `username`, starting a draft when the two
    /// users have not talked yet.
    pub async fn open_conversation(&mut self, username: &str) -> ClientResult<()> {
        let other = self.api.profile(username).await?;
        // Conversations started by the other side since login are not listed yet
        self.refresh_conversations().await?;
        let effects = self.session.select(other);
        self.run(effects).await
    }

    pub async fn send(&mut self, text: &str, img: Option<&str>) -> ClientResult<Message> {
        let recipient_id = self
            .session
            .open_user()
            .map(|user| user.id)
            .ok_or(ClientError::NoConversation)?;
        if !self.session.begin_send() {
            return Err(ClientError::SendInProgress);
        }

        match self.api.send_message(recipient_id, text, img).await {
            Ok(message) => {
                let effects = self.session.send_completed(message.clone());
                self.run(effects).await?;
                Ok(message)
            }
            Err(e) => {
                self.session.send_failed();
                Err(e)
            }
        }
    }

    /// Waits for the next server event, applies it and runs its effects.
    pub async fn next_event(&mut self) -> ClientResult<ServerEvent> {
        let event = self.live.recv().await?.ok_or(ClientError::Closed)?;
        let effects = self.session.apply(event.clone());
        self.run(effects).await?;
        Ok(event)
    }

    pub async fn ping(&mut self) -> ClientResult<()> {
        self.live.send(&ClientEvent::Ping).await
    }

    pub async fn disconnect(self) -> ClientResult<()> {
        self.live.close().await
    }

    async fn run(&mut self, effects: Vec<SessionEffect>) -> ClientResult<()> {
        let mut queue: VecDeque<SessionEffect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                SessionEffect::FetchHistory { other_user_id } => {
                    match self.api.history(other_user_id).await? {
                        Some(history) => {
                            queue.extend(self.session.history_loaded(other_user_id, history))
                        }
                        None => self.session.history_missing(other_user_id),
                    }
                }
                SessionEffect::MarkSeen {
                    conversation_id,
                    user_id,
                } => {
                    self.live
                        .send(&ClientEvent::MarkMessagesAsSeen(MarkSeenPayload {
                            conversation_id,
                            user_id,
                        }))
                        .await?;
                }
                SessionEffect::Chime => {
                    self.chimes += 1;
                    tracing::info!("New message for {}", self.user.username);
                }
                SessionEffect::RefreshUnreadCount => {
                    let count = self.api.unread_count().await?;
                    self.session.set_unread_count(count);
                }
            }
        }

        Ok(())
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}
