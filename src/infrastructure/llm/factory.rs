use std::sync::Arc;

use super::openai_chat::OpenAiChatModel;
use crate::domain::http::HttpTransport;
use crate::domain::llm::{ChatModel, ChatModelConfig, ChatModelFactory};
use crate::domain::DomainError;

/// Credential fields that may hold the API key, in lookup order
const API_KEY_FIELDS: &[&str] = &["openAIApiKey", "apiKey"];

/// Builds OpenAI-compatible chat models sharing one transport
#[derive(Debug, Clone)]
pub struct OpenAiChatModelFactory {
    transport: Arc<dyn HttpTransport>,
}

impl OpenAiChatModelFactory {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }
}

impl ChatModelFactory for OpenAiChatModelFactory {
    fn create(&self, config: &ChatModelConfig) -> Result<Arc<dyn ChatModel>, DomainError> {
        if config.model.trim().is_empty() {
            return Err(DomainError::configuration("Chat model name is required"));
        }

        let api_key = API_KEY_FIELDS
            .iter()
            .find_map(|field| config.credential.get(*field).filter(|v| !v.is_empty()))
            .ok_or_else(|| DomainError::credential("No API key found in chat model credential"))?;

        Ok(Arc::new(OpenAiChatModel::new(
            self.transport.clone(),
            config.clone(),
            api_key,
        )))
    }
}
