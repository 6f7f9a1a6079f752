//! Execute flow node: invokes another agentflow over its prediction API

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::services::{object_input, parse_http_url, state_directives, NodeServices};
use crate::domain::credentials::get_credential_param;
use crate::domain::http::{HttpMethod, HttpRequestSpec, HttpResponse, RequestBody, ResponseType};
use crate::domain::message::{ChatMessage, MessageRole};
use crate::domain::node::{
    FlowNode, InputType, NodeData, NodeError, NodeInputParam, NodeKind, NodeOutputEnvelope,
    RunOptions,
};
use crate::domain::state::apply_state_updates;
use crate::domain::variable::VariableResolver;

pub const SELECTED_FLOW: &str = "executeFlowSelectedFlow";
pub const FLOW_INPUT: &str = "executeFlowInput";
pub const OVERRIDE_CONFIG: &str = "executeFlowOverrideConfig";
pub const BASE_URL: &str = "executeFlowBaseURL";
pub const RETURN_RESPONSE_AS: &str = "executeFlowReturnResponseAs";
pub const UPDATE_STATE: &str = "executeFlowUpdateState";
pub const START_NEW_SESSION: &str = "startNewSession";

const API_KEY_PARAM: &str = "apiKey";

/// Role the sub-flow answer is recorded under
fn return_role(data: &NodeData) -> MessageRole {
    match data.input_str(RETURN_RESPONSE_AS) {
        Some("assistantMessage") => MessageRole::Assistant,
        _ => MessageRole::User,
    }
}

/// Text of a prediction response: `text`, else a fenced `json` block, else the whole body
pub fn prediction_text(response: &HttpResponse) -> String {
    let body = response.decode(ResponseType::Json);

    if let Some(text) = body.get("text").and_then(Value::as_str) {
        return text.to_string();
    }

    if let Some(block) = body.get("json").filter(|v| !v.is_null()) {
        let pretty = serde_json::to_string_pretty(block).unwrap_or_default();
        return format!("```json\n{}\n```", pretty);
    }

    match body {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_default(),
    }
}

#[derive(Debug, Clone)]
pub struct ExecuteFlowNode {
    services: NodeServices,
}

impl ExecuteFlowNode {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    fn base_url<'a>(&'a self, data: &'a NodeData, options: &'a RunOptions) -> Option<&'a str> {
        data.input_str(BASE_URL)
            .or(options.base_url.as_deref().filter(|u| !u.trim().is_empty()))
            .or(self.services.settings.default_base_url.as_deref())
    }
}

#[async_trait]
impl FlowNode for ExecuteFlowNode {
    fn kind(&self) -> NodeKind {
        NodeKind::ExecuteFlow
    }

    fn description(&self) -> &'static str {
        "Execute another flow"
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        vec![
            NodeInputParam::new(SELECTED_FLOW, "Select Flow", InputType::String),
            NodeInputParam::new(FLOW_INPUT, "Input", InputType::String).accept_variable(),
            NodeInputParam::new(OVERRIDE_CONFIG, "Override Config", InputType::Json)
                .optional()
                .accept_variable(),
            NodeInputParam::new(BASE_URL, "Base URL", InputType::String)
                .optional()
                .with_description("Base URL of the server hosting the flow"),
            NodeInputParam::new(RETURN_RESPONSE_AS, "Return Response As", InputType::Options)
                .with_options(&["userMessage", "assistantMessage"])
                .with_default(json!("userMessage")),
            NodeInputParam::new(START_NEW_SESSION, "Start New Session", InputType::Boolean)
                .optional(),
            NodeInputParam::new(UPDATE_STATE, "Update Flow State", InputType::Array).optional(),
        ]
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        let flow_id = data
            .input_str(SELECTED_FLOW)
            .ok_or_else(|| NodeError::missing_input(&data.id, SELECTED_FLOW))?;

        if flow_id == options.chatflow_id {
            return Err(NodeError::configuration("Cannot call the same agentflow!"));
        }

        let base_url = self
            .base_url(data, options)
            .ok_or_else(|| NodeError::configuration("Base URL is required to execute a flow"))?
            .trim_end_matches('/')
            .to_string();
        parse_http_url(&base_url)?;
        let raw_input = data
            .input_str(FLOW_INPUT)
            .ok_or_else(|| NodeError::missing_input(&data.id, FLOW_INPUT))?;
        let override_config = object_input(data, OVERRIDE_CONFIG)?;
        let directives = state_directives(data, UPDATE_STATE)?;

        let vars = self.services.variable_set(data, options).await?;
        let flow = options.flow_context(input);
        let resolver = VariableResolver::new(&flow, &vars, options.chat_history());

        let question = resolver.resolve_to_string(raw_input);
        let override_config = match resolver.resolve_value(&Value::Object(override_config)) {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let (chat_id, session_id) = if data.input_bool(START_NEW_SESSION) {
            let id = Uuid::new_v4().to_string();
            (id.clone(), id)
        } else {
            (options.chat_id.clone(), options.session_id.clone())
        };

        let mut request_override = Map::new();
        request_override.insert("sessionId".to_string(), Value::String(session_id));
        request_override.extend(override_config.clone());

        let credential = self.services.credential_data(data, options).await?;
        let url = format!("{}/api/v1/prediction/{}", base_url, flow_id);

        let mut request = HttpRequestSpec::new(HttpMethod::Post, &url)
            .with_header("Content-Type", "application/json")
            .with_body(RequestBody::Json(json!({
                "question": question,
                "chatId": chat_id,
                "overrideConfig": request_override,
            })))
            .with_timeout(self.services.settings.http_timeout);
        if let Some(api_key) = get_credential_param(API_KEY_PARAM, &credential, data) {
            request = request.with_header("Authorization", format!("Bearer {}", api_key));
        }

        let input_echo = json!({
            "messages": [{ "role": "user", "content": question }],
            "flowId": flow_id,
            "overrideConfig": override_config,
        });

        debug!(node_id = %data.id, url = %url, "Executing sub-flow");

        let response = match self.services.http.send(request).await {
            Ok(response) => response.error_for_status(),
            Err(err) => Err(err),
        };
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(node_id = %data.id, error = %err, "Sub-flow call failed");
                return Ok(
                    NodeOutputEnvelope::new(data, input_echo, options.state().clone())
                        .with_error(err),
                );
            }
        };

        let result_text = prediction_text(&response);

        if let Some(sink) = options.streamer() {
            sink.stream_token(&options.chat_id, &result_text).await;
        }

        let resolver = resolver.with_output(&result_text);
        let state = apply_state_updates(options.state(), directives, &resolver);

        let mut chat_history = Vec::new();
        if options.chat_history().is_empty() {
            chat_history.push(ChatMessage::user(&question));
        }
        chat_history.push(ChatMessage::new(return_role(data), &result_text).from_node(&data.id));

        Ok(NodeOutputEnvelope::new(data, input_echo, state)
            .with_output(json!({ "content": result_text }))
            .with_chat_history(chat_history))
    }
}
