use std::time::Duration;

use futures::{SinkExt, StreamExt};
use social_messenger::{
    client::{ApiClient, ChatClient, SessionState},
    create_router,
    storage::Stores,
    websocket::ServerEvent,
    AppState, Config,
};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use uuid::Uuid;

const PASSWORD: &str = "correct horse";

async fn spawn_server() -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(Config::for_testing("integration-secret"), Stores::memory());
    let app = create_router(state);
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), server)
}

async fn register(base_url: &str, username: &str) -> ChatClient {
    ChatClient::register(
        base_url,
        &username.to_uppercase(),
        username,
        &format!("{}@example.com", username),
        PASSWORD,
    )
    .await
    .unwrap()
}

/// Reads events until one matches, applying each to the client's session.
async fn wait_for<F>(client: &mut ChatClient, mut matches: F) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = client.next_event().await.unwrap();
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn live_message_and_read_receipt_flow() {
    let (base_url, server) = spawn_server().await;
    let mut alice = register(&base_url, "alice").await;
    let mut bob = register(&base_url, "bob").await;

    wait_for(&mut alice, |e| {
        matches!(e, ServerEvent::GetOnlineUsers(users) if users.len() == 2)
    })
    .await;
    assert!(alice.session().is_online(bob.user_id()));

    // Alice starts a draft and sends the first message
    alice.open_conversation("bob").await.unwrap();
    assert_eq!(alice.session().state(), SessionState::HistoryLoaded);
    assert_eq!(alice.session().conversation_id(), None);

    let sent = alice.send("hi bob", None).await.unwrap();
    assert_eq!(alice.session().conversation_id(), Some(sent.conversation_id));

    // Bob is not looking at the conversation: chime and badge
    let received = wait_for(&mut bob, |e| matches!(e, ServerEvent::NewMessage(_))).await;
    assert_eq!(received, ServerEvent::NewMessage(sent.clone()));
    assert_eq!(bob.chimes(), 1);
    assert_eq!(bob.session().unread_count(), 1);

    // Alice's own echo is deduplicated against the POST response
    wait_for(&mut alice, |e| matches!(e, ServerEvent::NewMessage(_))).await;
    assert_eq!(alice.session().messages().len(), 1);
    assert_eq!(alice.chimes(), 0);

    // Bob opens the conversation: history is fetched and one receipt goes out
    bob.open_conversation("alice").await.unwrap();
    assert_eq!(bob.session().state(), SessionState::HistoryLoaded);
    assert_eq!(bob.session().messages().len(), 1);
    assert_eq!(bob.session().messages()[0].id, sent.id);

    wait_for(&mut bob, |e| matches!(e, ServerEvent::MessagesSeen(_))).await;
    assert_eq!(bob.session().unread_count(), 0);

    let seen = wait_for(&mut alice, |e| matches!(e, ServerEvent::MessagesSeen(_))).await;
    match seen {
        ServerEvent::MessagesSeen(payload) => {
            assert_eq!(payload.conversation_id, sent.conversation_id)
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(alice.session().messages().iter().all(|m| m.seen));

    // No second receipt arrives before Bob's reply
    bob.send("hey alice", None).await.unwrap();
    let mut receipts = 0;
    wait_for(&mut alice, |e| match e {
        ServerEvent::MessagesSeen(_) => {
            receipts += 1;
            false
        }
        ServerEvent::NewMessage(m) => m.text.as_deref() == Some("hey alice"),
        _ => false,
    })
    .await;
    assert_eq!(receipts, 0);
    assert_eq!(alice.session().messages().len(), 2);
    assert_eq!(alice.chimes(), 0);

    let conversations = alice.api().conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].last_message.text.as_deref(), Some("hey alice"));

    server.abort();
}

#[tokio::test]
async fn offline_recipient_reads_history_after_reconnect() {
    let (base_url, server) = spawn_server().await;
    let dave = register(&base_url, "dave").await;
    dave.disconnect().await.unwrap();

    let mut erin = register(&base_url, "erin").await;
    erin.open_conversation("dave").await.unwrap();
    let sent = erin.send("are you there?", None).await.unwrap();

    let mut dave = ChatClient::login(&base_url, "dave", PASSWORD).await.unwrap();
    assert_eq!(dave.session().unread_count(), 1);
    assert_eq!(dave.session().previews().len(), 1);

    dave.open_conversation("erin").await.unwrap();
    let history = dave.session().messages();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, sent.id);
    assert_eq!(history[0].text.as_deref(), Some("are you there?"));

    server.abort();
}

#[tokio::test]
async fn history_for_strangers_is_not_found() {
    let (base_url, server) = spawn_server().await;
    let mut api = ApiClient::new(&base_url);
    api.register("Frank", "frank", "frank@example.com", PASSWORD)
        .await
        .unwrap();
    let grace = ApiClient::new(&base_url)
        .register("Grace", "grace", "grace@example.com", PASSWORD)
        .await
        .unwrap();

    assert_eq!(api.history(grace.user.id).await.unwrap(), None);
    assert_eq!(api.unread_count().await.unwrap(), 0);

    server.abort();
}

#[tokio::test]
async fn handshake_rejects_mismatched_user_id() {
    let (base_url, server) = spawn_server().await;
    let mut api = ApiClient::new(&base_url);
    api.register("Heidi", "heidi", "heidi@example.com", PASSWORD)
        .await
        .unwrap();
    let token = api.token().unwrap().to_string();

    let ws_root = base_url.replacen("http", "ws", 1);
    let url = format!("{}/api/v1/ws?userId={}&token={}", ws_root, Uuid::new_v4(), token);

    match connect_async(url).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            assert_eq!(response.status().as_u16(), 403);
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("handshake should have been refused"),
    }

    server.abort();
}

#[tokio::test]
async fn malformed_frame_gets_error_event() {
    let (base_url, server) = spawn_server().await;
    let mut api = ApiClient::new(&base_url);
    let ivan = api
        .register("Ivan", "ivan", "ivan@example.com", PASSWORD)
        .await
        .unwrap();

    let ws_root = base_url.replacen("http", "ws", 1);
    let url = format!(
        "{}/api/v1/ws?userId={}&token={}",
        ws_root,
        ivan.user.id,
        api.token().unwrap()
    );
    let (mut ws, _) = connect_async(url).await.unwrap();

    ws.send(WsMessage::Text("not json".to_string())).await.unwrap();

    let error = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frame = ws.next().await.unwrap().unwrap();
            if let WsMessage::Text(text) = frame {
                let event: ServerEvent = serde_json::from_str(&text).unwrap();
                if let ServerEvent::Error(payload) = event {
                    return payload;
                }
            }
        }
    })
    .await
    .unwrap();
    assert!(error.message.starts_with("Invalid event format"));

    server.abort();
}
