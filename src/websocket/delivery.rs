use tokio::sync::mpsc;
use uuid::Uuid;

use crate::message::Message;
use super::{
    connection::ConnectionManager,
    presence::PresenceRegistry,
    types::{MessagesSeenPayload, ServerEvent},
};

/// Live push side of messaging.
///
/// Owns the presence registry: only `connect` and `disconnect` write to it.
/// Every push is fire-and-forget. A user without a registered connection is a
/// presence miss and the push is skipped; the REST history is the fallback.
#[derive(Clone, Default)]
pub struct DeliveryChannel {
    presence: PresenceRegistry,
    connections: ConnectionManager,
}

/// A socket that has been admitted to the channel.
pub struct Registration {
    pub connection_id: Uuid,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

impl DeliveryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presence(&self) -> &PresenceRegistry {
        &self.presence
    }

    pub fn connect(&self, user_id: Uuid) -> Registration {
        let connection_id = Uuid::new_v4();
        let (tx, events) = mpsc::unbounded_channel();

        self.connections.add_connection(connection_id, tx);
        if let Some(previous) = self.presence.register(user_id, connection_id) {
            tracing::debug!(
                "User {} reconnected; connection {} replaces {}",
                user_id,
                connection_id,
                previous
            );
        }
        self.broadcast_online_users();

        tracing::info!("User {} connected on {}", user_id, connection_id);

        Registration {
            connection_id,
            events,
        }
    }

    pub fn disconnect(&self, user_id: Uuid, connection_id: Uuid) {
        self.connections.remove_connection(&connection_id);

        // A superseded session closing must not take the newer one offline
        if self.presence.unregister(user_id, connection_id) {
            self.broadcast_online_users();
        }

        tracing::info!("User {} disconnected from {}", user_id, connection_id);
    }

    pub fn push_to_connection(&self, connection_id: Uuid, event: ServerEvent) -> bool {
        self.connections.send_to_connection(&connection_id, event)
    }

    pub fn push_to_user(&self, user_id: Uuid, event: ServerEvent) -> bool {
        match self.presence.lookup(user_id) {
            Some(connection_id) => self.push_to_connection(connection_id, event),
            None => {
                tracing::debug!("Presence miss for user {}; push skipped", user_id);
                false
            }
        }
    }

    /// Pushes `newMessage` to the recipient and echoes it to the sender's
    /// registered connection. Returns how many pushes were handed off.
    pub fn push_new_message(&self, recipient_id: Uuid, sender_id: Uuid, message: &Message) -> usize {
        let mut delivered = 0;

        if self.push_to_user(recipient_id, ServerEvent::NewMessage(message.clone())) {
            delivered += 1;
        }
        if self.push_to_user(sender_id, ServerEvent::NewMessage(message.clone())) {
            delivered += 1;
        }

        delivered
    }

    /// Sends `messagesSeen` to the other participant and back to the socket
    /// that reported the read.
    pub fn push_messages_seen(&self, other_user_id: Uuid, origin_connection_id: Uuid, conversation_id: Uuid) {
        let event = ServerEvent::MessagesSeen(MessagesSeenPayload { conversation_id });

        self.push_to_user(other_user_id, event.clone());
        self.push_to_connection(origin_connection_id, event);
    }

    fn broadcast_online_users(&self) {
        self.connections
            .broadcast(ServerEvent::GetOnlineUsers(self.presence.list_active()));
    }
}
