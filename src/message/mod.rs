pub mod message_dto;
pub mod message_handlers;
pub mod message_models;
pub mod message_repository;
pub mod message_service;

pub use message_dto::{SendMessageRequest, UnreadCountResponse};
pub use message_models::Message;
pub use message_repository::MessageStore;
pub use message_service::MessageService;
