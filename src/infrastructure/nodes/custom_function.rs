//! Custom function node: runs a user snippet in the code sandbox

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::services::{array_input, state_directives, NodeServices};
use crate::domain::message::ChatMessage;
use crate::domain::node::{
    FlowNode, InputType, NodeData, NodeError, NodeInputParam, NodeKind, NodeOutputEnvelope,
    RunOptions,
};
use crate::domain::sandbox::SandboxDescriptor;
use crate::domain::state::apply_state_updates;
use crate::domain::variable::{value_to_output_string, VariableResolver};

pub const INPUT_VARIABLES: &str = "customFunctionInputVariables";
pub const JAVASCRIPT_FUNCTION: &str = "customFunctionJavascriptFunction";
pub const UPDATE_STATE: &str = "customFunctionUpdateState";

/// Executes JavaScript with `$vars`, `$flow`, `$input` and declared variables bound
#[derive(Debug, Clone)]
pub struct CustomFunctionNode {
    services: NodeServices,
}

impl CustomFunctionNode {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }
}

#[async_trait]
impl FlowNode for CustomFunctionNode {
    fn kind(&self) -> NodeKind {
        NodeKind::CustomFunction
    }

    fn description(&self) -> &'static str {
        "Execute custom function"
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        vec![
            NodeInputParam::new(INPUT_VARIABLES, "Input Variables", InputType::Array)
                .optional()
                .with_description("Input variables can be used in the function with prefix $"),
            NodeInputParam::new(JAVASCRIPT_FUNCTION, "Javascript Function", InputType::Code)
                .with_description("The function to execute. Must return a string or an object"),
            NodeInputParam::new(UPDATE_STATE, "Update Flow State", InputType::Array).optional(),
        ]
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        let code = data
            .input_str(JAVASCRIPT_FUNCTION)
            .ok_or_else(|| NodeError::missing_input(&data.id, JAVASCRIPT_FUNCTION))?;
        let declared = array_input(data, INPUT_VARIABLES)?;
        let directives = state_directives(data, UPDATE_STATE)?;

        let vars = self.services.variable_set(data, options).await?;
        let flow = options.flow_context(input);
        let resolver = VariableResolver::new(&flow, &vars, options.chat_history());

        let mut descriptor =
            SandboxDescriptor::new(Value::Object(vars.clone()), flow.to_value(), input);
        let mut input_variables = serde_json::Map::new();

        for item in &declared {
            let Some(name) = item
                .get("variableName")
                .and_then(Value::as_str)
                .filter(|n| !n.trim().is_empty())
            else {
                continue;
            };
            let value = match item.get("variableValue") {
                Some(Value::String(raw)) => resolver.resolve(raw),
                Some(other) => resolver.resolve_value(other),
                None => Value::String(String::new()),
            };

            input_variables.insert(name.to_string(), value.clone());
            descriptor = descriptor.with_variable(name, value);
        }

        debug!(node_id = %data.id, variables = input_variables.len(), "Executing custom function");

        let result = self
            .services
            .sandbox
            .execute(code, descriptor, &self.services.settings.sandbox_limits)
            .await?;

        let final_output = value_to_output_string(&result);

        if let Some(sink) = options.streamer() {
            sink.stream_token(&options.chat_id, &final_output).await;
        }

        let resolver = resolver.with_output(&final_output);
        let state = apply_state_updates(options.state(), directives, &resolver);

        Ok(NodeOutputEnvelope::new(
            data,
            json!({ "inputVariables": input_variables, "code": code }),
            state,
        )
        .with_output(json!({ "content": final_output }))
        .with_chat_history(vec![ChatMessage::assistant(&final_output).from_node(&data.id)]))
    }
}
