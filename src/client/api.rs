use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use uuid::Uuid;

use super::error::{ClientError, ClientResult};
use crate::{
    auth::auth_dto::AuthResponse,
    conversation::ConversationView,
    message::{Message, UnreadCountResponse},
    user::UserProjection,
};

/// REST half of the messaging client.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: format!("{}/api/v1", base_url.trim_end_matches('/')),
            token: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub async fn register(
        &mut self,
        name: &str,
        username: &str,
        email: &str,
        password: &str,
    ) -> ClientResult<AuthResponse> {
        let request = self.http.post(self.url("/auth/register")).json(&json!({
            "name": name,
            "username": username,
            "email": email,
            "password": password,
        }));
        let auth: AuthResponse = read_json(request.send().await?).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> ClientResult<AuthResponse> {
        let request = self.http.post(self.url("/auth/login")).json(&json!({
            "username": username,
            "password": password,
        }));
        let auth: AuthResponse = read_json(request.send().await?).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn profile(&self, username: &str) -> ClientResult<UserProjection> {
        let request = self.authed(self.http.get(self.url(&format!("/users/profile/{}", username))));
        read_json(request.send().await?).await
    }

    pub async fn send_message(
        &self,
        recipient_id: Uuid,
        text: &str,
        img: Option<&str>,
    ) -> ClientResult<Message> {
        let request = self.authed(self.http.post(self.url("/messages")).json(&json!({
            "recipientId": recipient_id,
            "message": text,
            "img": img,
        })));
        read_json(request.send().await?).await
    }

    /// `None` when the two users have never exchanged a message.
    pub async fn history(&self, other_user_id: Uuid) -> ClientResult<Option<Vec<Message>>> {
        let request = self.authed(self.http.get(self.url(&format!("/messages/{}", other_user_id))));
        match read_json(request.send().await?).await {
            Ok(messages) => Ok(Some(messages)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn conversations(&self) -> ClientResult<Vec<ConversationView>> {
        let request = self.authed(self.http.get(self.url("/messages/conversations")));
        read_json(request.send().await?).await
    }

    pub async fn unread_count(&self) -> ClientResult<i64> {
        let request = self.authed(self.http.get(self.url("/messages/unread/count")));
        let body: UnreadCountResponse = read_json(request.send().await?).await?;
        Ok(body.count)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| status.to_string());

    Err(ClientError::Api { status, message })
}
