//! Client side of the messaging system: the conversation session state
//! machine plus the REST and WebSocket transports that feed it.

pub mod api;
pub mod chat_client;
pub mod error;
pub mod live;
pub mod session;

pub use api::ApiClient;
pub use chat_client::ChatClient;
pub use error::{ClientError, ClientResult};
pub use live::LiveConnection;
pub use session::{ConversationPreview, ConversationSession, SessionEffect, SessionState};
