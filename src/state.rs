use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    auth::AuthService,
    message::MessageService,
    storage::Stores,
    user::UserStore,
    websocket::DeliveryChannel,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub user_store: Arc<dyn UserStore>,
    pub delivery: DeliveryChannel,
    pub auth_service: AuthService,
    pub message_service: MessageService,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        let config = Arc::new(config);
        let delivery = DeliveryChannel::new();

        let auth_service = AuthService::new(
            stores.users.clone(),
            config.jwt_secret.clone(),
            config.jwt_expiration_hours,
            config.bcrypt_cost,
        );
        let message_service = MessageService::new(
            stores.conversations.clone(),
            stores.messages.clone(),
            stores.users.clone(),
            delivery.clone(),
        );

        Self {
            config,
            user_store: stores.users,
            delivery,
            auth_service,
            message_service,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub database_url: Option<String>,
    pub storage_backend: StorageBackend,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub ws_heartbeat: Duration,
    pub bcrypt_cost: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;

        let jwt_expiration_hours = std::env::var("JWT_EXPIRATION_HOURS")
            .unwrap_or_else(|_| "72".to_string())
            .parse()
            .context("JWT_EXPIRATION_HOURS must be a number")?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let storage_backend = match std::env::var("STORAGE_BACKEND").ok().as_deref() {
            Some("memory") => StorageBackend::Memory,
            Some("postgres") => StorageBackend::Postgres,
            Some(other) => anyhow::bail!("STORAGE_BACKEND must be `postgres` or `memory`, got `{}`", other),
            None if database_url.is_some() => StorageBackend::Postgres,
            None => StorageBackend::Memory,
        };
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when STORAGE_BACKEND is postgres");
        }

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid port number")?;

        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let ws_heartbeat_secs: u64 = std::env::var("WS_HEARTBEAT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("WS_HEARTBEAT_SECS must be a number")?;
        if ws_heartbeat_secs == 0 {
            anyhow::bail!("WS_HEARTBEAT_SECS must be greater than zero");
        }

        let bcrypt_cost = std::env::var("BCRYPT_COST")
            .ok()
            .map(|cost| cost.parse())
            .transpose()
            .context("BCRYPT_COST must be a number")?
            .unwrap_or(bcrypt::DEFAULT_COST);

        Ok(Self {
            jwt_secret,
            jwt_expiration_hours,
            database_url,
            storage_backend,
            host,
            port,
            cors_origins,
            ws_heartbeat: Duration::from_secs(ws_heartbeat_secs),
            bcrypt_cost,
        })
    }

    /// Settings for tests and local tooling: in-memory storage, cheap hashing.
    pub fn for_testing(jwt_secret: &str) -> Self {
        Self {
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration_hours: 1,
            database_url: None,
            storage_backend: StorageBackend::Memory,
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["http://localhost:5173".to_string()],
            ws_heartbeat: Duration::from_secs(30),
            bcrypt_cost: 4,
        }
    }
}
