use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::domain::message::ChatMessage;
use crate::domain::state::FlowState;
use crate::domain::streaming::StreamSink;
use crate::domain::variable::FlowContext;

/// State and history threaded from node to node during a run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentflowRuntime {
    #[serde(default)]
    pub state: FlowState,

    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

/// Per-invocation options handed to a node by the scheduler
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub agentflow_runtime: AgentflowRuntime,
    pub chat_id: String,
    pub session_id: String,
    pub chatflow_id: String,
    pub is_last_node: bool,
    pub sse_streamer: Option<Arc<dyn StreamSink>>,
    pub base_url: Option<String>,
    pub org_id: Option<String>,
    pub prepend_messages: Vec<ChatMessage>,
    /// `overrideConfig.vars` supplied with the run
    pub override_vars: Option<Value>,
}

impl RunOptions {
    pub fn new(
        chatflow_id: impl Into<String>,
        chat_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            chatflow_id: chatflow_id.into(),
            chat_id: chat_id.into(),
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: FlowState) -> Self {
        self.agentflow_runtime.state = state;
        self
    }

    pub fn with_chat_history(mut self, chat_history: Vec<ChatMessage>) -> Self {
        self.agentflow_runtime.chat_history = chat_history;
        self
    }

    pub fn with_streamer(mut self, streamer: Arc<dyn StreamSink>) -> Self {
        self.sse_streamer = Some(streamer);
        self
    }

    pub fn last_node(mut self, is_last_node: bool) -> Self {
        self.is_last_node = is_last_node;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_prepend_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.prepend_messages = messages;
        self
    }

    pub fn with_override_vars(mut self, vars: Value) -> Self {
        self.override_vars = Some(vars);
        self
    }

    pub fn state(&self) -> &FlowState {
        &self.agentflow_runtime.state
    }

    pub fn chat_history(&self) -> &[ChatMessage] {
        &self.agentflow_runtime.chat_history
    }

    /// The sink, but only when this node is the run's terminal node
    pub fn streamer(&self) -> Option<&dyn StreamSink> {
        if self.is_last_node {
            self.sse_streamer.as_deref()
        } else {
            None
        }
    }

    /// Flow context exposed to `$flow` references
    pub fn flow_context(&self, input: &str) -> FlowContext {
        FlowContext::new(&self.chatflow_id, &self.session_id, &self.chat_id)
            .with_input(input)
            .with_state(self.agentflow_runtime.state.clone())
    }
}
