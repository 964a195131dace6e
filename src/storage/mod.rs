pub mod memory;
pub mod postgres;

use std::sync::Arc;

use crate::{conversation::ConversationStore, message::MessageStore, user::UserStore};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// The three store seams, backed by one engine.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub messages: Arc<dyn MessageStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            conversations: store.clone(),
            messages: store,
        }
    }

    pub fn postgres(pool: crate::db::DbPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            conversations: store.clone(),
            messages: store,
        }
    }
}
