pub mod conversation_dto;
pub mod conversation_models;
pub mod conversation_repository;

pub use conversation_dto::ConversationView;
pub use conversation_models::{Conversation, LastMessage, ParticipantPair};
pub use conversation_repository::ConversationStore;
