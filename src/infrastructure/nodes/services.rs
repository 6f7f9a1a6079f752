//! Collaborators and settings shared by every node, plus common run helpers

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::credentials::{CredentialData, CredentialResolver};
use crate::domain::http::HttpTransport;
use crate::domain::llm::ChatModelFactory;
use crate::domain::node::{NodeData, NodeError, RunOptions};
use crate::domain::sandbox::{CodeSandbox, SandboxLimits};
use crate::domain::state::StateUpdateDirective;
use crate::domain::variable::{build_variable_set, VariableSet, VariableStore};

/// Settings resolved from configuration once, at construction time
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub sandbox_limits: SandboxLimits,
    pub http_timeout: Duration,
    /// Used by ExecuteFlow when neither the node nor the run sets a base URL
    pub default_base_url: Option<String>,
    /// Pause before answering with a moderation rejection
    pub moderation_delay: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            sandbox_limits: SandboxLimits::default(),
            http_timeout: Duration::from_secs(60),
            default_base_url: None,
            moderation_delay: Duration::from_millis(500),
        }
    }
}

/// Everything a node may call out to
#[derive(Debug, Clone)]
pub struct NodeServices {
    pub sandbox: Arc<dyn CodeSandbox>,
    pub http: Arc<dyn HttpTransport>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub variables: Arc<dyn VariableStore>,
    pub chat_models: Arc<dyn ChatModelFactory>,
    pub settings: RuntimeSettings,
}

impl NodeServices {
    pub fn new(
        sandbox: Arc<dyn CodeSandbox>,
        http: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialResolver>,
        variables: Arc<dyn VariableStore>,
        chat_models: Arc<dyn ChatModelFactory>,
    ) -> Self {
        Self {
            sandbox,
            http,
            credentials,
            variables,
            chat_models,
            settings: RuntimeSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fetch `$vars` for one node invocation, applying run-level overrides
    pub async fn variable_set(
        &self,
        data: &NodeData,
        options: &RunOptions,
    ) -> Result<VariableSet, NodeError> {
        let variables = self.variables.get_vars(&data.id).await?;
        Ok(build_variable_set(variables, options.override_vars.as_ref()))
    }

    /// Resolve the node's credential, empty when none is configured
    pub async fn credential_data(
        &self,
        data: &NodeData,
        options: &RunOptions,
    ) -> Result<CredentialData, NodeError> {
        match data.credential.as_deref().filter(|c| !c.is_empty()) {
            Some(id) => Ok(self
                .credentials
                .get_credential_data(id, options.org_id.as_deref())
                .await?),
            None => Ok(CredentialData::new()),
        }
    }
}

/// Parse a state-update input into directives
pub fn state_directives(
    data: &NodeData,
    input_name: &str,
) -> Result<Vec<StateUpdateDirective>, NodeError> {
    StateUpdateDirective::list_from_input(data.input(input_name))
        .map_err(|e| NodeError::parse(input_name, e))
}

/// Parse an array-valued input, accepting a JSON-encoded string too
pub fn array_input(data: &NodeData, input_name: &str) -> Result<Vec<Value>, NodeError> {
    match data.input(input_name) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => {
            serde_json::from_str(s).map_err(|e| NodeError::parse(input_name, e))
        }
        Some(other) => Err(NodeError::parse(
            input_name,
            format!("expected an array, got {}", other),
        )),
    }
}

/// Parse an object-valued input, accepting a JSON-encoded string too
pub fn object_input(
    data: &NodeData,
    input_name: &str,
) -> Result<serde_json::Map<String, Value>, NodeError> {
    match data.input(input_name) {
        None => Ok(serde_json::Map::new()),
        Some(Value::Object(obj)) => Ok(obj.clone()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(serde_json::Map::new()),
        Some(Value::String(s)) => {
            serde_json::from_str(s).map_err(|e| NodeError::parse(input_name, e))
        }
        Some(other) => Err(NodeError::parse(
            input_name,
            format!("expected an object, got {}", other),
        )),
    }
}

/// Absolute http(s) URL check, done before any request is built
pub fn parse_http_url(raw: &str) -> Result<reqwest::Url, NodeError> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| NodeError::configuration(format!("Invalid URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(NodeError::configuration(format!(
            "Unsupported URL scheme '{}' in '{}'",
            scheme, raw
        ))),
    }
}

/// `{ key, value }` pairs from an array input; entries without a key are skipped
pub fn key_value_pairs(items: &[Value]) -> Vec<(String, Value)> {
    items
        .iter()
        .filter_map(|item| {
            let key = item.get("key")?.as_str()?.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), item.get("value").cloned().unwrap_or(Value::Null)))
        })
        .collect()
}
