//! Chat model implementations

mod factory;
mod openai_chat;

pub use factory::OpenAiChatModelFactory;
pub use openai_chat::{OpenAiChatModel, DEFAULT_OPENAI_BASE_URL};
