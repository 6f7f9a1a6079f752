//! HTTP node: a single configurable outbound request

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::services::{array_input, key_value_pairs, parse_http_url, state_directives, NodeServices};
use crate::domain::http::{
    BodyType, HttpAuth, HttpMethod, HttpRequestSpec, RequestBody, ResponseType,
};
use crate::domain::message::ChatMessage;
use crate::domain::node::{
    FlowNode, InputType, NodeData, NodeError, NodeInputParam, NodeKind, NodeOutputEnvelope,
    RunOptions,
};
use crate::domain::state::apply_state_updates;
use crate::domain::variable::{value_to_output_string, value_to_string, VariableResolver};

pub const METHOD: &str = "method";
pub const URL: &str = "url";
pub const HEADERS: &str = "headers";
pub const QUERY_PARAMS: &str = "queryParams";
pub const BODY_TYPE: &str = "bodyType";
pub const BODY: &str = "body";
pub const RESPONSE_TYPE: &str = "responseType";
pub const UPDATE_STATE: &str = "httpUpdateState";

#[derive(Debug, Clone)]
pub struct HttpNode {
    services: NodeServices,
}

fn parse_option<T>(data: &NodeData, name: &str) -> Result<T, NodeError>
where
    T: std::str::FromStr<Err = String> + Default,
{
    match data.input_str(name) {
        Some(raw) => raw.parse().map_err(|e: String| NodeError::configuration(e)),
        None => Ok(T::default()),
    }
}

impl HttpNode {
    pub fn new(services: NodeServices) -> Self {
        Self { services }
    }

    /// Resolved `(name, value)` pairs from a `[{ key, value }]` input
    fn resolved_pairs(
        data: &NodeData,
        name: &str,
        resolver: &VariableResolver<'_>,
    ) -> Result<Vec<(String, String)>, NodeError> {
        let items = match data.input(name) {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| json!({ "key": k, "value": v }))
                .collect(),
            _ => array_input(data, name)?,
        };

        Ok(key_value_pairs(&items)
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(raw) => resolver.resolve_to_string(&raw),
                    other => value_to_string(&resolver.resolve_value(&other)),
                };
                (key, value)
            })
            .collect())
    }

    fn build_body(
        data: &NodeData,
        body_type: BodyType,
        resolver: &VariableResolver<'_>,
    ) -> Result<RequestBody, NodeError> {
        if !data.has_input(BODY) {
            return Ok(RequestBody::Empty);
        }

        match body_type {
            BodyType::Json => {
                let body = match data.input(BODY) {
                    Some(Value::String(raw)) => {
                        let rendered = resolver.render(raw);
                        serde_json::from_str(&rendered).map_err(|e| NodeError::parse(BODY, e))?
                    }
                    Some(other) => resolver.resolve_value(other),
                    None => Value::Null,
                };
                Ok(RequestBody::Json(body))
            }
            BodyType::Raw => {
                let text = match data.input(BODY) {
                    Some(Value::String(raw)) => resolver.render(raw),
                    Some(other) => value_to_string(&resolver.resolve_value(other)),
                    None => String::new(),
                };
                Ok(RequestBody::Raw(text))
            }
            BodyType::FormData => Ok(RequestBody::Multipart(Self::resolved_pairs(
                data, BODY, resolver,
            )?)),
            BodyType::UrlEncoded => Ok(RequestBody::Form(Self::resolved_pairs(
                data, BODY, resolver,
            )?)),
        }
    }
}

#[async_trait]
impl FlowNode for HttpNode {
    fn kind(&self) -> NodeKind {
        NodeKind::Http
    }

    fn description(&self) -> &'static str {
        "Send a HTTP request"
    }

    fn declare_inputs(&self) -> Vec<NodeInputParam> {
        vec![
            NodeInputParam::new(METHOD, "Method", InputType::Options)
                .with_options(&["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"])
                .with_default(json!("GET")),
            NodeInputParam::new(URL, "URL", InputType::String).accept_variable(),
            NodeInputParam::new(HEADERS, "Headers", InputType::Array).optional(),
            NodeInputParam::new(QUERY_PARAMS, "Query Params", InputType::Array).optional(),
            NodeInputParam::new(BODY_TYPE, "Body Type", InputType::Options)
                .with_options(&["json", "raw", "formData", "x-www-form-urlencoded"])
                .optional(),
            NodeInputParam::new(BODY, "Body", InputType::Json)
                .optional()
                .accept_variable(),
            NodeInputParam::new(RESPONSE_TYPE, "Response Type", InputType::Options)
                .with_options(&["json", "text", "arraybuffer", "base64"])
                .with_default(json!("json")),
            NodeInputParam::new(UPDATE_STATE, "Update Flow State", InputType::Array).optional(),
        ]
    }

    async fn run(
        &self,
        data: &NodeData,
        input: &str,
        options: &RunOptions,
    ) -> Result<NodeOutputEnvelope, NodeError> {
        let raw_url = data
            .input_str(URL)
            .ok_or_else(|| NodeError::missing_input(&data.id, URL))?;
        let method: HttpMethod = parse_option(data, METHOD)?;
        let body_type: BodyType = parse_option(data, BODY_TYPE)?;
        let response_type: ResponseType = parse_option(data, RESPONSE_TYPE)?;
        let directives = state_directives(data, UPDATE_STATE)?;

        let vars = self.services.variable_set(data, options).await?;
        let flow = options.flow_context(input);
        let resolver = VariableResolver::new(&flow, &vars, options.chat_history());

        let url = resolver.resolve_to_string(raw_url);
        parse_http_url(&url)?;

        let mut request = HttpRequestSpec::new(method, &url)
            .with_timeout(self.services.settings.http_timeout);

        for (name, value) in Self::resolved_pairs(data, HEADERS, &resolver)? {
            request = request.with_header(name, value);
        }
        for (name, value) in Self::resolved_pairs(data, QUERY_PARAMS, &resolver)? {
            request = request.with_query(name, value);
        }

        let credential = self.services.credential_data(data, options).await?;
        if let Some(auth) = HttpAuth::from_credential(&credential) {
            let (name, value) = auth.header();
            request = request.with_header(name, value);
        }

        if method.allows_body() {
            let body = Self::build_body(data, body_type, &resolver)?;
            if body_type == BodyType::Json
                && matches!(body, RequestBody::Json(_))
                && request.header("Content-Type").is_none()
            {
                request = request.with_header("Content-Type", "application/json");
            }
            request = request.with_body(body);
        }

        let input_echo = json!({
            "http": {
                "method": method,
                "url": url,
                "headers": request.headers.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
                "queryParams": request
                    .query
                    .iter()
                    .map(|(k, v)| json!({ "key": k, "value": v }))
                    .collect::<Vec<_>>(),
                "bodyType": body_type,
                "responseType": response_type,
            }
        });

        debug!(node_id = %data.id, method = %method, url = %url, "Sending HTTP node request");

        let response = match self.services.http.send(request).await {
            Ok(response) => response.error_for_status(),
            Err(err) => Err(err),
        };
        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(node_id = %data.id, error = %err, "HTTP node request failed");
                return Ok(
                    NodeOutputEnvelope::new(data, input_echo, options.state().clone())
                        .with_error(err),
                );
            }
        };

        let response_data = response.decode(response_type);
        let output_text = value_to_output_string(&response_data);

        let resolver = resolver.with_output(&output_text);
        let state = apply_state_updates(options.state(), directives, &resolver);

        Ok(NodeOutputEnvelope::new(data, input_echo, state)
            .with_output(json!({
                "http": {
                    "data": response_data,
                    "status": response.status,
                    "statusText": response.status_text,
                    "headers": response.headers,
                }
            }))
            .with_chat_history(vec![ChatMessage::assistant(&output_text).from_node(&data.id)]))
    }
}
