use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use crate::domain::streaming::{StreamEvent, StreamSink};

/// Stream sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingStreamer {
    events: Mutex<Vec<(String, StreamEvent)>>,
}

impl RecordingStreamer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, chat_id: &str, event: StreamEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((chat_id.to_string(), event));
        }
    }

    pub fn events(&self) -> Vec<StreamEvent> {
        self.events
            .lock()
            .map(|events| events.iter().map(|(_, e)| e.clone()).collect())
            .unwrap_or_default()
    }

    /// Concatenated token text
    pub fn text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Token(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn ended(&self) -> bool {
        self.events().last().is_some_and(|e| e.is_end())
    }

    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }
}

#[async_trait]
impl StreamSink for RecordingStreamer {
    async fn stream_token(&self, chat_id: &str, token: &str) {
        self.push(chat_id, StreamEvent::Token(token.to_string()));
    }

    async fn stream_source_documents(&self, chat_id: &str, documents: Value) {
        self.push(chat_id, StreamEvent::SourceDocuments(documents));
    }

    async fn stream_used_tools(&self, chat_id: &str, tools: Value) {
        self.push(chat_id, StreamEvent::UsedTools(tools));
    }

    async fn stream_end(&self, chat_id: &str) {
        self.push(chat_id, StreamEvent::End);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::streaming::stream_words;

    #[tokio::test]
    async fn test_records_words_then_end() {
        let recorder = RecordingStreamer::new();

        stream_words(&recorder, "chat", "one two  three").await;
        recorder.stream_end("chat").await;

        assert_eq!(recorder.text(), "one two  three");
        assert_eq!(recorder.events().len(), 4);
        assert!(recorder.ended());
    }
}
