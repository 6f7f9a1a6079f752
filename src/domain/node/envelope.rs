use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{NodeData, NodeError};
use crate::domain::http::HttpError;
use crate::domain::message::ChatMessage;
use crate::domain::state::FlowState;

/// Error recorded in an envelope instead of being raised
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunError {
    pub name: String,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
}

impl NodeRunError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            status: None,
            status_text: None,
            data: None,
            headers: None,
        }
    }
}

impl From<HttpError> for NodeRunError {
    fn from(err: HttpError) -> Self {
        let name = if err.has_response() {
            "HttpResponseError"
        } else {
            "HttpRequestError"
        };

        Self {
            name: name.to_string(),
            message: err.message,
            status: err.status,
            status_text: err.status_text,
            data: err.data,
            headers: err.headers,
        }
    }
}

impl From<NodeError> for NodeRunError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Http(http) => http.into(),
            other => Self::new(other.kind(), other.to_string()),
        }
    }
}

/// Result of a node run
///
/// On a recoverable failure `output` is absent and `error` is set; `input`
/// and `state` still carry the snapshot taken before the failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeOutputEnvelope {
    pub id: String,
    pub name: String,
    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    pub state: FlowState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_history: Option<Vec<ChatMessage>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<NodeRunError>,
}

impl NodeOutputEnvelope {
    pub fn new(node: &NodeData, input: Value, state: FlowState) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            input,
            output: None,
            state,
            chat_history: None,
            error: None,
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.output = Some(output);
        self.error = None;
        self
    }

    pub fn with_chat_history(mut self, chat_history: Vec<ChatMessage>) -> Self {
        self.chat_history = Some(chat_history);
        self
    }

    pub fn with_error(mut self, error: impl Into<NodeRunError>) -> Self {
        self.error = Some(error.into());
        self.output = None;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// `output.content` when the output carries text content
    pub fn content(&self) -> Option<&str> {
        self.output
            .as_ref()
            .and_then(|o| o.get("content"))
            .and_then(Value::as_str)
    }
}
