//! Variable resolution against the flow context, project variables and chat history
//!
//! Resolution is lenient: a reference that cannot be resolved keeps its
//! literal text instead of failing the node.

use serde_json::Value;

use super::flow_context::FlowContext;
use super::path::{get_nested_field, value_to_string};
use super::store::VariableSet;
use super::token::{parse_template, VariableToken};
use crate::domain::message::ChatMessage;

/// Resolves parsed tokens for one node invocation
#[derive(Debug, Clone)]
pub struct VariableResolver<'a> {
    flow: Value,
    vars: &'a VariableSet,
    chat_history: &'a [ChatMessage],
    output: Option<&'a str>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(flow: &FlowContext, vars: &'a VariableSet, chat_history: &'a [ChatMessage]) -> Self {
        Self {
            flow: flow.to_value(),
            vars,
            chat_history,
            output: None,
        }
    }

    /// Make the node's freshly computed output available to `{{ output }}`
    pub fn with_output(mut self, output: &'a str) -> Self {
        self.output = Some(output);
        self
    }

    /// Resolve a single token, `None` when it cannot be resolved
    pub fn resolve_token(&self, token: &VariableToken) -> Option<Value> {
        match token {
            VariableToken::Literal(text) => Some(Value::String(text.clone())),
            VariableToken::VarRef(None) => Some(Value::Object(self.vars.clone())),
            VariableToken::VarRef(Some(path)) => {
                let (name, rest) = split_first_segment(path);
                let value = self.vars.get(name)?;
                get_nested_field(value, rest).cloned()
            }
            VariableToken::FlowRef(None) => Some(self.flow.clone()),
            VariableToken::FlowRef(Some(path)) => get_nested_field(&self.flow, path).cloned(),
            VariableToken::NodeOutputRef(node_id) => self
                .chat_history
                .iter()
                .rev()
                .find(|msg| msg.node_id.as_deref() == Some(node_id.as_str()))
                .map(|msg| Value::String(msg.content.clone())),
            VariableToken::OutputPlaceholder(None) => {
                self.output.map(|out| Value::String(out.to_string()))
            }
            VariableToken::OutputPlaceholder(Some(path)) => {
                let parsed: Value = serde_json::from_str(self.output?).ok()?;
                get_nested_field(&parsed, path).cloned()
            }
        }
    }

    /// Resolve a whole configured string
    ///
    /// A value that is exactly one reference yields the referenced JSON value
    /// (keeping its type); anything else is rendered as a template string.
    pub fn resolve(&self, raw: &str) -> Value {
        match VariableToken::parse(raw) {
            VariableToken::Literal(_) => Value::String(self.render(raw)),
            token => self
                .resolve_token(&token)
                .unwrap_or_else(|| Value::String(raw.to_string())),
        }
    }

    /// Resolve every string inside a JSON value
    pub fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.resolve(s),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve_value(v)).collect()),
            Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Substitute every `{{ ... }}` reference embedded in a string
    pub fn render(&self, template: &str) -> String {
        parse_template(template)
            .into_iter()
            .map(|part| match part.token {
                VariableToken::Literal(text) => text,
                token => self
                    .resolve_token(&token)
                    .map(|v| value_to_string(&v))
                    .unwrap_or(part.raw),
            })
            .collect()
    }

    /// Render to text, resolving whole-value references as well
    pub fn resolve_to_string(&self, raw: &str) -> String {
        value_to_string(&self.resolve(raw))
    }
}

fn split_first_segment(path: &str) -> (&str, &str) {
    match path.split_once('.') {
        Some((head, rest)) => (head, rest),
        None => (path, ""),
    }
}
