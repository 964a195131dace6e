pub mod auth;
pub mod client;
pub mod conversation;
pub mod db;
pub mod error;
pub mod message;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod storage;
pub mod user;
pub mod websocket;

pub use routes::create_router;
pub use state::{AppState, Config, StorageBackend};
