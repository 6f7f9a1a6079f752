use async_trait::async_trait;
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::domain::http::{ByteStream, HttpMethod, HttpRequestSpec, HttpTransport, RequestBody};
use crate::domain::llm::{ChatModel, ChatModelConfig, TokenStream};
use crate::domain::message::{ChatMessage, MessageRole};
use crate::domain::DomainError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Chat model speaking the OpenAI chat-completions protocol
#[derive(Debug)]
pub struct OpenAiChatModel {
    transport: Arc<dyn HttpTransport>,
    config: ChatModelConfig,
    auth_header: String,
    base_url: String,
}

impl OpenAiChatModel {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        config: ChatModelConfig,
        api_key: impl AsRef<str>,
    ) -> Self {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Self {
            transport,
            auth_header: format!("Bearer {}", api_key.as_ref()),
            config,
            base_url,
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, messages: &[ChatMessage], stream: bool) -> Value {
        let messages: Vec<OpenAiMessage> = messages.iter().map(OpenAiMessage::from_domain).collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": stream,
        });

        if let Some(temperature) = self.config.temperature {
            body["temperature"] = json!(temperature);
        }

        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }

    fn request(&self, body: Value) -> HttpRequestSpec {
        HttpRequestSpec::new(HttpMethod::Post, self.chat_completions_url())
            .with_header("Authorization", self.auth_header.as_str())
            .with_header("Content-Type", "application/json")
            .with_body(RequestBody::Json(body))
    }

    async fn post(&self, body: Value) -> Result<String, DomainError> {
        let response = self
            .transport
            .send(self.request(body))
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DomainError::provider("openai", e.to_string()))?;

        Ok(response.text())
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, DomainError> {
        let text = self.post(self.build_request(messages, false)).await?;

        let response: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
            DomainError::provider("openai", format!("Failed to parse response: {}", e))
        })?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::provider("openai", "No choices in response"))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, DomainError> {
        let bytes = self
            .transport
            .send_stream(self.request(self.build_request(messages, true)))
            .await
            .map_err(|e| DomainError::provider("openai", e.to_string()))?;

        Ok(Box::pin(sse_tokens(bytes)))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Incremental SSE decoder; a line may span several network chunks
struct SseDecoder {
    bytes: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, DomainError>>,
    done: bool,
}

impl SseDecoder {
    fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.line(&String::from_utf8_lossy(&line));
        }
    }

    fn finish(&mut self) {
        let rest = std::mem::take(&mut self.buffer);
        self.line(&String::from_utf8_lossy(&rest));
        self.done = true;
    }

    fn line(&mut self, line: &str) {
        if self.done {
            return;
        }

        let Some(data) = line.trim().strip_prefix("data:").map(str::trim) else {
            return;
        };

        if data == "[DONE]" {
            self.done = true;
            return;
        }

        match serde_json::from_str::<OpenAiStreamChunk>(data) {
            Ok(chunk) => {
                if let Some(content) = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|content| !content.is_empty())
                {
                    self.pending.push_back(Ok(content));
                }
            }
            Err(e) => self.pending.push_back(Err(DomainError::provider(
                "openai",
                format!("Malformed stream chunk: {}", e),
            ))),
        }
    }
}

/// Content deltas of an SSE body, yielded as soon as each line completes
fn sse_tokens(bytes: ByteStream) -> impl Stream<Item = Result<String, DomainError>> + Send {
    let decoder = SseDecoder {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(item) = decoder.pending.pop_front() {
                return Some((item, decoder));
            }

            if decoder.done {
                return None;
            }

            match decoder.bytes.next().await {
                Some(Ok(chunk)) => decoder.feed(&chunk),
                Some(Err(e)) => {
                    decoder.done = true;
                    let error = DomainError::provider("openai", format!("Stream error: {}", e));
                    return Some((Err(error), decoder));
                }
                None => decoder.finish(),
            }
        }
    })
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

impl OpenAiMessage {
    fn from_domain(message: &ChatMessage) -> Self {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };

        Self {
            role,
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}
