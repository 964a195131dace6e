use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Process-local map of user id to the id of their live connection.
///
/// Ephemeral and best-effort: it is rebuilt as clients reconnect and only
/// the delivery channel's connect/disconnect handlers write to it.
#[derive(Clone, Default)]
pub struct PresenceRegistry {
    entries: Arc<DashMap<Uuid, Uuid>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last connect wins. Returns the connection that was replaced, if any.
    pub(super) fn register(&self, user_id: Uuid, connection_id: Uuid) -> Option<Uuid> {
        self.entries.insert(user_id, connection_id)
    }

    /// Removes the entry only while it still points at `connection_id`, so a
    /// superseded session closing leaves the newer one registered. Returns
    /// whether anything was removed; an absent user is a no-op.
    pub(super) fn unregister(&self, user_id: Uuid, connection_id: Uuid) -> bool {
        self.entries
            .remove_if(&user_id, |_, current| *current == connection_id)
            .is_some()
    }

    pub fn lookup(&self, user_id: Uuid) -> Option<Uuid> {
        self.entries.get(&user_id).map(|entry| *entry.value())
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.entries.contains_key(&user_id)
    }

    /// Sorted so that repeated broadcasts of the same set are identical.
    pub fn list_active(&self) -> Vec<Uuid> {
        let mut users: Vec<Uuid> = self.entries.iter().map(|entry| *entry.key()).collect();
        users.sort();
        users
    }
}
