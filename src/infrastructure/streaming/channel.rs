use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::domain::streaming::{StreamEvent, StreamSink};

/// One server-sent event bound for a chat
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SseFrame {
    pub chat_id: String,
    #[serde(flatten)]
    pub event: StreamEvent,
}

impl SseFrame {
    /// Wire form: a single `data:` line holding the JSON event
    pub fn to_sse_string(&self) -> String {
        let payload = serde_json::json!({
            "event": self.event.name(),
            "data": match &self.event {
                StreamEvent::Token(token) => Value::String(token.clone()),
                StreamEvent::SourceDocuments(docs) | StreamEvent::UsedTools(docs) => docs.clone(),
                StreamEvent::End => Value::String(self.event.data()),
            },
        });
        format!("data: {}\n\n", payload)
    }
}

/// Stream sink that forwards events over a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelStreamer {
    tx: mpsc::Sender<SseFrame>,
}

impl ChannelStreamer {
    /// Create the sink plus the stream the transport layer drains
    pub fn channel(buffer: usize) -> (Self, ReceiverStream<SseFrame>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, ReceiverStream::new(rx))
    }

    async fn send(&self, chat_id: &str, event: StreamEvent) {
        let frame = SseFrame {
            chat_id: chat_id.to_string(),
            event,
        };

        // receiver gone means the client disconnected
        if self.tx.send(frame).await.is_err() {
            debug!(chat_id = %chat_id, "Stream receiver dropped, discarding event");
        }
    }
}

#[async_trait]
impl StreamSink for ChannelStreamer {
    async fn stream_token(&self, chat_id: &str, token: &str) {
        self.send(chat_id, StreamEvent::Token(token.to_string())).await;
    }

    async fn stream_source_documents(&self, chat_id: &str, documents: Value) {
        self.send(chat_id, StreamEvent::SourceDocuments(documents)).await;
    }

    async fn stream_used_tools(&self, chat_id: &str, tools: Value) {
        self.send(chat_id, StreamEvent::UsedTools(tools)).await;
    }

    async fn stream_end(&self, chat_id: &str) {
        self.send(chat_id, StreamEvent::End).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (streamer, stream) = ChannelStreamer::channel(16);

        streamer.stream_token("chat-1", "Hel").await;
        streamer.stream_token("chat-1", "lo").await;
        streamer.stream_used_tools("chat-1", json!([])).await;
        streamer.stream_end("chat-1").await;
        drop(streamer);

        let frames: Vec<SseFrame> = stream.collect().await;
        let events: Vec<_> = frames.iter().map(|f| f.event.clone()).collect();

        assert_eq!(
            events,
            vec![
                StreamEvent::Token("Hel".into()),
                StreamEvent::Token("lo".into()),
                StreamEvent::UsedTools(json!([])),
                StreamEvent::End,
            ]
        );
        assert!(frames.iter().all(|f| f.chat_id == "chat-1"));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_ignored() {
        let (streamer, stream) = ChannelStreamer::channel(1);
        drop(stream);
        streamer.stream_token("chat-1", "lost").await;
    }

    #[test]
    fn test_sse_wire_format() {
        let frame = SseFrame {
            chat_id: "c".into(),
            event: StreamEvent::Token("hi".into()),
        };
        assert_eq!(frame.to_sse_string(), "data: {\"data\":\"hi\",\"event\":\"token\"}\n\n");
    }
}
