use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use uuid::Uuid;

use super::error::{ClientError, ClientResult};
use crate::websocket::{ClientEvent, ServerEvent};

/// Socket half of the messaging client.
pub struct LiveConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl LiveConnection {
    /// `base_url` is the server root; `http` becomes `ws`.
    pub async fn connect(base_url: &str, user_id: Uuid, token: &str) -> ClientResult<Self> {
        let root = base_url.trim_end_matches('/');
        let ws_root = match root.strip_prefix("http") {
            Some(rest) => format!("ws{}", rest),
            None => root.to_string(),
        };
        let url = format!("{}/api/v1/ws?userId={}&token={}", ws_root, user_id, token);

        let (stream, _) = connect_async(url).await?;
        tracing::debug!("Live connection open for {}", user_id);

        Ok(Self { stream })
    }

    pub async fn send(&mut self, event: &ClientEvent) -> ClientResult<()> {
        let json = serde_json::to_string(event)?;
        self.stream.send(WsMessage::Text(json)).await?;
        Ok(())
    }

    /// Next server event; `None` once the server has closed the socket.
    pub async fn recv(&mut self) -> ClientResult<Option<ServerEvent>> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                WsMessage::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
                WsMessage::Close(_) => return Ok(None),
                _ => {}
            }
        }
        Ok(None)
    }

    pub async fn close(mut self) -> ClientResult<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(ClientError::WebSocket(e)),
        }
    }
}
