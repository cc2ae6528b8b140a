//! Concrete [`crate::agent::provider::ChatModel`] implementations.

pub mod openai;

pub use openai::OpenAiChatModel;
