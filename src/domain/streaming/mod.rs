//! Streaming fan-out seam
//!
//! Only the run's terminal node may write to the sink. Tokens are emitted in
//! generation order and `end` is the last event for a chat.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

/// One event pushed to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum StreamEvent {
    Token(String),
    SourceDocuments(Value),
    UsedTools(Value),
    End,
}

impl StreamEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::SourceDocuments(_) => "sourceDocuments",
            Self::UsedTools(_) => "usedTools",
            Self::End => "end",
        }
    }

    /// SSE data payload
    pub fn data(&self) -> String {
        match self {
            Self::Token(token) => token.clone(),
            Self::SourceDocuments(docs) | Self::UsedTools(docs) => docs.to_string(),
            Self::End => "[DONE]".to_string(),
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Sink for incremental output of the terminal node
#[async_trait]
pub trait StreamSink: Send + Sync + Debug {
    async fn stream_token(&self, chat_id: &str, token: &str);

    async fn stream_source_documents(&self, chat_id: &str, documents: Value);

    async fn stream_used_tools(&self, chat_id: &str, tools: Value);

    async fn stream_end(&self, chat_id: &str);
}

/// Stream text as whitespace-preserving word tokens
pub async fn stream_words(sink: &dyn StreamSink, chat_id: &str, text: &str) {
    for token in split_word_tokens(text) {
        sink.stream_token(chat_id, token).await;
    }
}

/// Split text into tokens of a word plus its trailing whitespace
///
/// Concatenating the tokens yields the input unchanged.
pub fn split_word_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space = false;

    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_space = true;
        } else if in_space {
            tokens.push(&text[start..idx]);
            start = idx;
            in_space = false;
        }
    }

    if start < text.len() {
        tokens.push(&text[start..]);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_word_tokens() {
        assert_eq!(
            split_word_tokens("Cannot Process!  Input"),
            vec!["Cannot ", "Process!  ", "Input"]
        );
        assert_eq!(split_word_tokens(""), Vec::<&str>::new());
        assert_eq!(split_word_tokens("  lead").concat(), "  lead");
    }

    #[test]
    fn test_event_frames() {
        assert_eq!(StreamEvent::Token("hi".into()).name(), "token");
        assert_eq!(StreamEvent::End.data(), "[DONE]");
        assert_eq!(
            StreamEvent::UsedTools(json!([{"tool": "x"}])).data(),
            r#"[{"tool":"x"}]"#
        );
        assert_eq!(
            serde_json::to_value(StreamEvent::Token("a".into())).unwrap(),
            json!({"event": "token", "data": "a"})
        );
    }
}
