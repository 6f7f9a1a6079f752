use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;

use crate::domain::credentials::CredentialData;
use crate::domain::message::ChatMessage;
use crate::domain::DomainError;

/// Incremental text chunks from a chat model
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, DomainError>> + Send>>;

/// A chat model client constructed once per node invocation
#[async_trait]
pub trait ChatModel: Send + Sync + Debug {
    /// Complete the conversation in one call
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, DomainError>;

    /// Complete the conversation as a token stream
    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, DomainError>;

    fn model_name(&self) -> &str;
}

/// Configuration handed to a [`ChatModelFactory`]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatModelConfig {
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Resolved credential fields, never serialized
    #[serde(skip)]
    pub credential: CredentialData,

    /// Provider-specific settings passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_credential(mut self, credential: CredentialData) -> Self {
        self.credential = credential;
        self
    }
}

/// Builds chat model clients from node configuration
pub trait ChatModelFactory: Send + Sync + Debug {
    fn create(&self, config: &ChatModelConfig) -> Result<Arc<dyn ChatModel>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use futures::stream;
    use std::sync::Mutex;

    #[derive(Debug)]
    pub struct MockChatModel {
        response: String,
        received: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl MockChatModel {
        pub fn new(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                received: Mutex::new(Vec::new()),
            }
        }

        pub fn received(&self) -> Vec<Vec<ChatMessage>> {
            self.received.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatModel for MockChatModel {
        async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, DomainError> {
            self.received.lock().unwrap().push(messages.to_vec());
            Ok(self.response.clone())
        }

        async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, DomainError> {
            self.received.lock().unwrap().push(messages.to_vec());
            let chunks: Vec<Result<String, DomainError>> = self
                .response
                .split_inclusive(' ')
                .map(|chunk| Ok(chunk.to_string()))
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    /// Hands out the same mock model for every config
    #[derive(Debug)]
    pub struct MockChatModelFactory {
        pub model: Arc<MockChatModel>,
        configs: Mutex<Vec<ChatModelConfig>>,
    }

    impl MockChatModelFactory {
        pub fn new(response: impl Into<String>) -> Self {
            Self {
                model: Arc::new(MockChatModel::new(response)),
                configs: Mutex::new(Vec::new()),
            }
        }

        pub fn configs(&self) -> Vec<ChatModelConfig> {
            self.configs.lock().unwrap().clone()
        }
    }

    impl ChatModelFactory for MockChatModelFactory {
        fn create(&self, config: &ChatModelConfig) -> Result<Arc<dyn ChatModel>, DomainError> {
            self.configs.lock().unwrap().push(config.clone());
            Ok(self.model.clone())
        }
    }
}
