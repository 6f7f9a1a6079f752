//! Per-run flow context exposed as `$flow`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::state::FlowState;

/// Identity and working memory of the current flow run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowContext {
    pub chatflow_id: String,
    pub session_id: String,
    pub chat_id: String,
    pub input: String,
    pub state: FlowState,
}

impl FlowContext {
    pub fn new(
        chatflow_id: impl Into<String>,
        session_id: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            chatflow_id: chatflow_id.into(),
            session_id: session_id.into(),
            chat_id: chat_id.into(),
            input: String::new(),
            state: FlowState::new(),
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    pub fn with_state(mut self, state: FlowState) -> Self {
        self.state = state;
        self
    }

    /// JSON view used for `$flow.<path>` lookups and sandbox injection
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
