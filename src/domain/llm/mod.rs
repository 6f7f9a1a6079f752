//! Chat model collaborator seam used by the LLM node

mod chat_model;

pub use chat_model::{ChatModel, ChatModelConfig, ChatModelFactory, TokenStream};

#[cfg(test)]
pub use chat_model::mock;
