pub mod connection;
pub mod delivery;
pub mod handler;
pub mod presence;
pub mod types;

pub use connection::{ConnectionManager, WsSender};
pub use delivery::{DeliveryChannel, Registration};
pub use handler::ws_handler;
pub use presence::PresenceRegistry;
pub use types::{ClientEvent, MarkSeenPayload, MessagesSeenPayload, ServerEvent};
