//! Direct reply node: answers with a fixed, template-rendered message

use async_trait::async_trait;
use serde_json::json;

use super::services::NodeServices;
use crate::domain::message::ChatMessage;
use crate::domain::node::{
    FlowNode, InputType, NodeData, NodeError, NodeInputParam, NodeKind, NodeOutputEnvelope,
    RunOptions,
};
use crate::domain::streaming::stream_words;
use crate::domain::variable::VariableResolver;

pub const MESSAGE: &str = "directReplyMessage";

#[derive(Debug, Clone)]
pub struct DirectReplyNode {
    services: NodeServices,
}

impl DirectReplyNode {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl FlowNode for DirectReplyNode {
    fn kind(&self) -> NodeKind {
        NodeKind::DirectReply
    }

    fn description(&self) -> &'static str {
        "Directly reply to the user with a message"
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        vec![NodeInputParam::new(MESSAGE, "Message", InputType::String).accept_variable()]
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        let template = data
            .input_str(MESSAGE)
            .ok_or_else(|| NodeError::missing_input(&data.id, MESSAGE))?;

        let vars = self.services.variable_set(data, options).await?;
        let flow = options.flow_context(input);
        let resolver = VariableResolver::new(&flow, &vars, options.chat_history());
        let reply = resolver.resolve_to_string(template);

        if let Some(sink) = options.streamer() {
            stream_words(sink, &options.chat_id, &reply).await;
        }

        Ok(NodeOutputEnvelope::new(data, json!({}), options.state().clone())
            .with_output(json!({ "content": reply }))
            .with_chat_history(vec![ChatMessage::assistant(&reply).from_node(&data.id)]))
    }
}
