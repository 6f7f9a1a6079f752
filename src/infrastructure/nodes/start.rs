//! Start node: entry point that seeds the flow state

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::services::{array_input, key_value_pairs, NodeServices};
use crate::domain::node::{
    FlowNode, InputType, NodeData, NodeError, NodeInputParam, NodeKind, NodeOutputEnvelope,
    RunOptions,
};
use crate::domain::variable::VariableResolver;

pub const START_STATE: &str = "startState";
pub const START_INPUT_TYPE: &str = "startInputType";

/// Receives the question and declares the initial state keys
#[derive(Debug, Clone)]
pub struct StartNode {
    services: NodeServices,
}

impl StartNode {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl FlowNode for StartNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Start
    }

    fn description(&self) -> &'static str {
        "Starting point of the agentflow"
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        vec![
            NodeInputParam::new(START_INPUT_TYPE, "Input Type", InputType::Options)
                .with_options(&["chatInput", "formInput"])
                .with_default(json!("chatInput")),
            NodeInputParam::new(START_STATE, "Flow State", InputType::Array)
                .optional()
                .with_description("Runtime state during the execution of the workflow"),
        ]
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        let declared = key_value_pairs(&array_input(data, START_STATE)?);
        let vars = self.services.variable_set(data, options).await?;
        let flow = options.flow_context(input);
        let resolver = VariableResolver::new(&flow, &vars, options.chat_history());

        let mut state = options.state().clone();
        for (key, value) in declared {
            let value = match value {
                Value::Null => Value::String(String::new()),
                other => resolver.resolve_value(&other),
            };
            state.set(key, value);
        }

        debug!(node_id = %data.id, keys = state.len(), "Flow state seeded");

        Ok(NodeOutputEnvelope::new(data, json!({ "question": input }), state)
            .with_output(json!({ "question": input })))
    }
}
