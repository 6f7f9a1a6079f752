//! Linear flow runner
//!
//! Runs an ordered list of nodes one at a time, threading flow state and
//! chat history from each envelope into the next node's options. Branch
//! selection after a condition node is left to the caller; every node in
//! the list runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::message::ChatMessage;
use crate::domain::node::{FlowNode, NodeData, NodeError, NodeKind, NodeOutputEnvelope, RunOptions};
use crate::domain::state::FlowState;
use crate::domain::streaming::StreamSink;
use crate::infrastructure::nodes::NodeRegistry;

/// A flow as an ordered list of configured nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub nodes: Vec<NodeData>,
}

/// Per-run inputs supplied by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowRunRequest {
    pub question: String,

    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    /// `{ "vars": { ... } }` overrides project variables by name
    #[serde(default)]
    pub override_config: Option<Value>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub org_id: Option<String>,

    /// Earlier turns of the conversation
    #[serde(default)]
    pub history: Vec<ChatMessage>,

    /// Messages placed ahead of every chat model prompt
    #[serde(default)]
    pub prepend_messages: Vec<ChatMessage>,
}

impl FlowRunRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_chat_id(mut self, chat_id: impl Into<String>) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_override_config(mut self, override_config: Value) -> Self {
        self.override_config = Some(override_config);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_prepend_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.prepend_messages = messages;
        self
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowRunResult {
    pub chatflow_id: String,
    pub chat_id: String,
    pub session_id: String,

    /// Content of the last node that produced any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    pub state: FlowState,
    pub chat_history: Vec<ChatMessage>,
    pub node_outputs: Vec<NodeOutputEnvelope>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowRunError {
    #[error("Flow '{0}' has no nodes")]
    EmptyFlow(String),

    #[error("Flow exceeds the maximum of {max} nodes")]
    TooManyNodes { max: usize },

    #[error("Start node '{node_id}' must be the first node")]
    MisplacedStart { node_id: String },

    #[error("Invalid node '{node_id}': {source}")]
    InvalidNode {
        node_id: String,
        #[source]
        source: NodeError,
    },

    #[error("Node '{node_id}' failed: {source}")]
    NodeFailed {
        node_id: String,
        #[source]
        source: NodeError,
    },
}

#[derive(Debug, Clone)]
pub struct FlowRunnerConfig {
    /// Upper bound on nodes in a single flow
    pub max_nodes: usize,
}

impl Default for FlowRunnerConfig {
    fn default() -> Self {
        Self { max_nodes: 100 }
    }
}

#[derive(Debug, Clone)]
pub struct FlowRunner {
    registry: NodeRegistry,
    config: FlowRunnerConfig,
}

impl FlowRunner {
    pub fn new(registry: NodeRegistry) -> Self {
        Self {
            registry,
            config: FlowRunnerConfig::default(),
        }
    }

    pub fn with_config(registry: NodeRegistry, config: FlowRunnerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Check every node's configuration before any node runs
    pub fn validate(&self, flow: &FlowDefinition) -> Result<(), FlowRunError> {
        if flow.nodes.is_empty() {
            return Err(FlowRunError::EmptyFlow(flow.id.clone()));
        }

        if flow.nodes.len() > self.config.max_nodes {
            return Err(FlowRunError::TooManyNodes {
                max: self.config.max_nodes,
            });
        }

        for (index, node) in flow.nodes.iter().enumerate() {
            if index > 0 && node.name == NodeKind::Start.name() {
                return Err(FlowRunError::MisplacedStart {
                    node_id: node.id.clone(),
                });
            }

            self.registry
                .validate(node)
                .map_err(|source| FlowRunError::InvalidNode {
                    node_id: node.id.clone(),
                    source,
                })?;
        }

        Ok(())
    }

    pub async fn run(
        &self,
        flow: &FlowDefinition,
        request: FlowRunRequest,
        streamer: Option<Arc<dyn StreamSink>>,
    ) -> Result<FlowRunResult, FlowRunError> {
        let start = Instant::now();
        let started_at = Utc::now();
        self.validate(flow)?;

        let chat_id = request
            .chat_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let session_id = request.session_id.clone().unwrap_or_else(|| chat_id.clone());
        let override_vars = request
            .override_config
            .as_ref()
            .and_then(|config| config.get("vars"))
            .cloned();

        info!(flow_id = %flow.id, chat_id = %chat_id, nodes = flow.nodes.len(), "Running flow");

        let mut state = FlowState::new();
        let mut chat_history = request.history.clone();
        let mut node_outputs = Vec::with_capacity(flow.nodes.len());
        let last_index = flow.nodes.len() - 1;

        for (index, data) in flow.nodes.iter().enumerate() {
            let node = self
                .registry
                .resolve(data)
                .map_err(|source| FlowRunError::InvalidNode {
                    node_id: data.id.clone(),
                    source,
                })?;

            let mut options = RunOptions::new(&flow.id, &chat_id, &session_id)
                .with_state(state.clone())
                .with_chat_history(chat_history.clone())
                .with_prepend_messages(request.prepend_messages.clone())
                .last_node(index == last_index);
            if let Some(streamer) = &streamer {
                options = options.with_streamer(streamer.clone());
            }
            if let Some(base_url) = &request.base_url {
                options = options.with_base_url(base_url);
            }
            if let Some(org_id) = &request.org_id {
                options = options.with_org_id(org_id);
            }
            if let Some(vars) = &override_vars {
                options = options.with_override_vars(vars.clone());
            }

            let node_start = Instant::now();
            debug!(node_id = %data.id, node_name = %data.name, index, "Running node");

            let envelope = match node.run(data, &request.question, &options).await {
                Ok(envelope) => envelope,
                Err(source) => {
                    warn!(node_id = %data.id, error = %source, "Node failed, aborting run");
                    // close the client's stream so it does not wait for tokens
                    if let Some(streamer) = &streamer {
                        streamer.stream_end(&chat_id).await;
                    }
                    return Err(FlowRunError::NodeFailed {
                        node_id: data.id.clone(),
                        source,
                    });
                }
            };

            if let Some(error) = &envelope.error {
                warn!(node_id = %data.id, error = %error.message, "Node returned an error envelope");
            }

            debug!(
                node_id = %data.id,
                elapsed_ms = node_start.elapsed().as_millis() as u64,
                "Node finished"
            );

            state = envelope.state.clone();
            if let Some(messages) = &envelope.chat_history {
                chat_history.extend(messages.iter().cloned());
            }
            node_outputs.push(envelope);
        }

        if let Some(streamer) = &streamer {
            streamer.stream_end(&chat_id).await;
        }

        let text = node_outputs
            .iter()
            .rev()
            .find_map(|envelope| envelope.content().map(str::to_string));

        Ok(FlowRunResult {
            chatflow_id: flow.id.clone(),
            chat_id,
            session_id,
            text,
            state,
            chat_history,
            node_outputs,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credentials::mock::MockCredentialResolver;
    use crate::domain::llm::mock::MockChatModelFactory;
    use crate::domain::sandbox::mock::MockSandbox;
    use crate::infrastructure::nodes::services::mock::mock_services;
    use crate::infrastructure::sandbox::BoaSandbox;
    use crate::infrastructure::streaming::RecordingStreamer;
    use crate::infrastructure::variables::InMemoryVariableStore;
    use serde_json::json;

    fn flow(nodes: Vec<NodeData>) -> FlowDefinition {
        FlowDefinition {
            id: "flow-1".to_string(),
            name: None,
            nodes,
        }
    }

    fn start() -> NodeData {
        NodeData::new("startAgentflow_0", "startAgentflow")
            .with_input("startState", json!([{"key": "shout", "value": ""}]))
    }

    fn custom_function() -> NodeData {
        NodeData::new("customFunctionAgentflow_0", "customFunctionAgentflow")
            .with_input(
                "customFunctionJavascriptFunction",
                json!("return ($input + $vars.suffix).toUpperCase()"),
            )
            .with_input(
                "customFunctionUpdateState",
                json!([{"key": "shout", "value": "{{ output }}"}]),
            )
    }

    fn reply() -> NodeData {
        NodeData::new("directReplyAgentflow_0", "directReplyAgentflow")
            .with_input("directReplyMessage", json!("{{ $flow.state.shout }}"))
    }

    fn runner() -> FlowRunner {
        let mut services = mock_services();
        services.sandbox = Arc::new(BoaSandbox::default());
        services.variables = Arc::new(InMemoryVariableStore::new().with_variable("suffix", "!"));
        FlowRunner::new(NodeRegistry::new(services))
    }

    #[tokio::test]
    async fn test_threads_state_through_nodes() {
        let streamer = Arc::new(RecordingStreamer::new());
        let result = runner()
            .run(
                &flow(vec![start(), custom_function(), reply()]),
                FlowRunRequest::new("hey").with_chat_id("chat-1"),
                Some(streamer.clone()),
            )
            .await
            .unwrap();

        assert_eq!(result.state.get("shout"), Some(&json!("HEY!")));
        assert_eq!(result.text.as_deref(), Some("HEY!"));
        assert_eq!(result.node_outputs.len(), 3);
        assert_eq!(result.chat_id, "chat-1");
        assert_eq!(result.session_id, "chat-1");

        // only the last node streams, then the run ends
        assert_eq!(streamer.text(), "HEY!");
        assert!(streamer.ended());
    }

    #[tokio::test]
    async fn test_override_vars_reach_nodes() {
        let result = runner()
            .run(
                &flow(vec![start(), custom_function()]),
                FlowRunRequest::new("hey").with_override_config(json!({"vars": {"suffix": "?"}})),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.state.get("shout"), Some(&json!("HEY?")));
    }

    #[tokio::test]
    async fn test_invalid_node_fails_before_running_anything() {
        let sandbox = Arc::new(MockSandbox::new().with_result(json!("x")));
        let mut services = mock_services();
        services.sandbox = sandbox.clone();
        let runner = FlowRunner::new(NodeRegistry::new(services));

        let err = runner
            .run(
                &flow(vec![
                    start(),
                    custom_function(),
                    NodeData::new("httpAgentflow_0", "httpAgentflow"),
                ]),
                FlowRunRequest::new("hey"),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, FlowRunError::InvalidNode { ref node_id, .. } if node_id == "httpAgentflow_0"));
        assert!(sandbox.calls().is_empty());
    }

    #[tokio::test]
    async fn test_structural_errors() {
        let runner = runner();

        assert_eq!(
            runner.validate(&flow(vec![])),
            Err(FlowRunError::EmptyFlow("flow-1".to_string()))
        );
        assert!(matches!(
            runner.validate(&flow(vec![reply(), start()])),
            Err(FlowRunError::MisplacedStart { .. })
        ));
        assert!(matches!(
            runner.validate(&flow(vec![NodeData::new("x", "agentAgentflow")])),
            Err(FlowRunError::InvalidNode { .. })
        ));
    }

    #[tokio::test]
    async fn test_fatal_node_error_stops_the_run() {
        let streamer = Arc::new(RecordingStreamer::new());
        let err = runner()
            .run(
                &flow(vec![
                    start(),
                    NodeData::new("customFunctionAgentflow_0", "customFunctionAgentflow")
                        .with_input("customFunctionJavascriptFunction", json!("throw new Error('nope')")),
                    reply(),
                ]),
                FlowRunRequest::new("hey").with_chat_id("chat-1"),
                Some(streamer.clone()),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FlowRunError::NodeFailed { source: NodeError::Sandbox(_), .. }
        ));

        // the reply node never ran, but the stream is still closed
        assert_eq!(streamer.text(), "");
        assert!(streamer.ended());
    }

    #[tokio::test]
    async fn test_prepend_messages_lead_the_prompt() {
        let factory = Arc::new(MockChatModelFactory::new("Short answer"));
        let mut services = mock_services();
        services.chat_models = factory.clone();
        services.credentials =
            Arc::new(MockCredentialResolver::new().with_credential("openai", &[("openAIApiKey", "sk")]));
        let runner = FlowRunner::new(NodeRegistry::new(services));

        let llm = NodeData::new("llmAgentflow_0", "llmAgentflow")
            .with_credential("openai")
            .with_input("llmModel", json!("chatOpenAI"))
            .with_input("llmModelConfig", json!({"modelName": "gpt-4o-mini"}));

        let result = runner
            .run(
                &flow(vec![start(), llm]),
                FlowRunRequest::new("What is Rust?")
                    .with_prepend_messages(vec![ChatMessage::system("Be brief")]),
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.text.as_deref(), Some("Short answer"));
        assert_eq!(
            factory.model.received()[0],
            vec![ChatMessage::system("Be brief"), ChatMessage::user("What is Rust?")]
        );
    }

    #[test]
    fn test_request_deserializes_prepend_messages() {
        let request: FlowRunRequest = serde_json::from_value(json!({
            "question": "hi",
            "prependMessages": [{"role": "system", "content": "Be brief"}]
        }))
        .unwrap();

        assert_eq!(request.prepend_messages, vec![ChatMessage::system("Be brief")]);
        assert!(request.history.is_empty());
    }
}
