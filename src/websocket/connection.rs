use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::ServerEvent;

pub type WsSender = mpsc::UnboundedSender<ServerEvent>;

/// Outbound queues of every open socket, keyed by connection id.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    connections: Arc<DashMap<Uuid, WsSender>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&self, connection_id: Uuid, sender: WsSender) {
        self.connections.insert(connection_id, sender);
    }

    pub fn remove_connection(&self, connection_id: &Uuid) {
        self.connections.remove(connection_id);
    }

    /// Never blocks. Returns false when the connection is gone.
    pub fn send_to_connection(&self, connection_id: &Uuid, event: ServerEvent) -> bool {
        match self.connections.get(connection_id) {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    pub fn broadcast(&self, event: ServerEvent) {
        for entry in self.connections.iter() {
            let _ = entry.value().send(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_to_missing_connection() {
        let manager = ConnectionManager::new();
        assert!(!manager.send_to_connection(&Uuid::new_v4(), ServerEvent::Ping));
    }

    #[test]
    fn test_broadcast_reaches_every_connection() {
        let manager = ConnectionManager::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.add_connection(Uuid::new_v4(), tx_a);
        manager.add_connection(Uuid::new_v4(), tx_b);

        manager.broadcast(ServerEvent::Pong);

        assert_eq!(rx_a.try_recv().unwrap(), ServerEvent::Pong);
        assert_eq!(rx_b.try_recv().unwrap(), ServerEvent::Pong);
    }

    #[test]
    fn test_closed_receiver_reports_failure() {
        let manager = ConnectionManager::new();
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        manager.add_connection(id, tx);
        drop(rx);

        assert!(!manager.send_to_connection(&id, ServerEvent::Ping));
    }
}
