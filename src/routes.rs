use crate::{
    auth::{
        auth_dto::{AuthResponse, LoginRequest, RegisterRequest},
        auth_handlers,
    },
    conversation::{ConversationView, LastMessage},
    message::{
        message_dto::{SendMessageRequest, UnreadCountResponse},
        message_handlers,
        message_models::Message,
    },
    middleware::auth_middleware,
    state::AppState,
    user::{user_handlers, UserProjection, UserResponse},
};
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::auth::auth_handlers::register,
        crate::auth::auth_handlers::login,
        crate::auth::auth_handlers::logout,
        crate::user::user_handlers::get_current_user,
        crate::user::user_handlers::get_profile,
        crate::message::message_handlers::send_message,
        crate::message::message_handlers::get_messages,
        crate::message::message_handlers::get_conversations,
        crate::message::message_handlers::get_unread_count,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UserResponse,
            UserProjection,
            SendMessageRequest,
            UnreadCountResponse,
            Message,
            LastMessage,
            ConversationView,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User profile endpoints"),
        (name = "messages", description = "Direct messaging endpoints")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    // Public routes (no auth required)
    let auth_routes = Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/logout", post(auth_handlers::logout));

    // Protected routes (auth required)
    let user_routes = Router::new()
        .route("/me", get(user_handlers::get_current_user))
        .route("/profile/:username", get(user_handlers::get_profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Static segments take priority over `/:other_user_id`
    let message_routes = Router::new()
        .route("/", post(message_handlers::send_message))
        .route("/conversations", get(message_handlers::get_conversations))
        .route("/unread/count", get(message_handlers::get_unread_count))
        .route("/:other_user_id", get(message_handlers::get_messages))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // WebSocket route
    let ws_routes = Router::new()
        .route("/ws", get(crate::websocket::ws_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/messages", message_routes)
        .merge(ws_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::create_jwt,
        state::Config,
        storage::Stores,
        user::NewUser,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "router-test-secret";

    struct Harness {
        state: AppState,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                state: AppState::new(Config::for_testing(SECRET), Stores::memory()),
            }
        }

        async fn user(&self, username: &str) -> (Uuid, String) {
            let user = self
                .state
                .user_store
                .create(NewUser {
                    name: username.to_string(),
                    username: username.to_string(),
                    email: format!("{}@example.com", username),
                    password_hash: "unused".to_string(),
                })
                .await
                .unwrap();
            let token = create_jwt(user.id, username, SECRET, 1).unwrap();
            (user.id, token)
        }

        async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = create_router(self.state.clone())
                .oneshot(request)
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }
    }

    fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_messages_require_auth() {
        let harness = Harness::new();
        let request = Request::builder()
            .uri("/api/v1/messages/conversations")
            .body(Body::empty())
            .unwrap();

        let (status, body) = harness.call(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_send_then_read_history() {
        let harness = Harness::new();
        let (_, alice_token) = harness.user("alice").await;
        let (bob, bob_token) = harness.user("bob").await;

        let (status, sent) = harness
            .call(post_json(
                "/api/v1/messages",
                Some(&alice_token),
                json!({ "recipientId": bob, "message": "hi bob" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent["text"], "hi bob");
        assert_eq!(sent["seen"], false);

        let alice = sent["senderId"].as_str().unwrap().to_string();
        let (status, history) = harness
            .call(get(&format!("/api/v1/messages/{}", alice), &bob_token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["id"], sent["id"]);

        let (status, count) = harness
            .call(get("/api/v1/messages/unread/count", &bob_token))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(count, json!({ "count": 1 }));
    }

    #[tokio::test]
    async fn test_history_without_conversation_is_not_found() {
        let harness = Harness::new();
        let (_, alice_token) = harness.user("alice").await;
        let (bob, _) = harness.user("bob").await;

        let (status, _) = harness
            .call(get(&format!("/api/v1/messages/{}", bob), &alice_token))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conversations_route_is_not_shadowed() {
        let harness = Harness::new();
        let (_, alice_token) = harness.user("alice").await;
        let (bob, _) = harness.user("bob").await;

        harness
            .call(post_json(
                "/api/v1/messages",
                Some(&alice_token),
                json!({ "recipientId": bob, "message": "hello" }),
            ))
            .await;

        let (status, conversations) = harness
            .call(get("/api/v1/messages/conversations", &alice_token))
            .await;
        assert_eq!(status, StatusCode::OK);
        let list = conversations.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["otherParticipant"]["username"], "bob");
        assert_eq!(list[0]["lastMessage"]["text"], "hello");
    }

    #[tokio::test]
    async fn test_send_validation_errors() {
        let harness = Harness::new();
        let (alice, alice_token) = harness.user("alice").await;

        let (status, _) = harness
            .call(post_json(
                "/api/v1/messages",
                Some(&alice_token),
                json!({ "message": "nobody to send to" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .call(post_json(
                "/api/v1/messages",
                Some(&alice_token),
                json!({ "recipientId": alice, "message": "note to self" }),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .call(post_json(
                "/api/v1/messages",
                Some(&alice_token),
                json!({ "recipientId": Uuid::new_v4(), "message": "anyone?" }),
            ))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_login_and_cookie_auth() {
        let harness = Harness::new();

        let (status, registered) = harness
            .call(post_json(
                "/api/v1/auth/register",
                None,
                json!({
                    "name": "Carol",
                    "username": "carol",
                    "email": "carol@example.com",
                    "password": "hunter22"
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(registered["user"]["username"], "carol");

        let response = create_router(harness.state.clone())
            .oneshot(post_json(
                "/api/v1/auth/login",
                None,
                json!({ "username": "carol", "password": "hunter22" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(axum::http::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("jwt="));
        assert!(cookie.contains("HttpOnly"));

        let session = cookie.split(';').next().unwrap().to_string();
        let request = Request::builder()
            .uri("/api/v1/users/me")
            .header(axum::http::header::COOKIE, session)
            .body(Body::empty())
            .unwrap();
        let (status, me) = harness.call(request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "carol");
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let harness = Harness::new();
        let body = json!({
            "name": "Dan",
            "username": "dan",
            "email": "dan@example.com",
            "password": "hunter22"
        });

        let (status, _) = harness
            .call(post_json("/api/v1/auth/register", None, body.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = harness
            .call(post_json("/api/v1/auth/register", None, body))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }
}
