//! Parser for the `$`-prefixed variable language
//!
//! Recognised forms:
//! - `$vars` / `$vars.<name>` - project variables
//! - `$flow` / `$flow.<path>` - per-run flow context (`sessionId`, `chatId`, `chatflowId`, `input`, `state`)
//! - `$<nodeId>` or a JSON object whose `id` names a prior node - that node's chat output
//! - `{{ output }}` / `{{ output.<path> }}` - the current node's own output (state directives only)
//!
//! Any of the `$` forms may also appear wrapped in `{{ ... }}` inside a longer string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static TEMPLATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").unwrap());

static NODE_REF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$([A-Za-z_][A-Za-z0-9_\-]*)$").unwrap());

static OUTPUT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^output(?:\.([A-Za-z0-9_.\-]+))?$").unwrap());

const VARS_PREFIX: &str = "$vars";
const FLOW_PREFIX: &str = "$flow";

/// A parsed variable reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableToken {
    /// Plain text, no substitution
    Literal(String),

    /// `$vars` (whole set) or `$vars.<name>[.<path>]`
    VarRef(Option<String>),

    /// `$flow` (whole context) or `$flow.<path>`
    FlowRef(Option<String>),

    /// Output of a previously executed node, looked up in chat history
    NodeOutputRef(String),

    /// The current node's own output, optionally with a path into it
    OutputPlaceholder(Option<String>),
}

/// One piece of a parsed template, keeping the source text for fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePart {
    pub raw: String,
    pub token: VariableToken,
}

impl VariableToken {
    /// Parse a whole configured value into a single token
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(caps) = TEMPLATE_PATTERN.captures(trimmed) {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            if whole.len() == trimmed.len() {
                let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                return parse_expression(inner, true)
                    .unwrap_or_else(|| Self::Literal(raw.to_string()));
            }
        }

        if let Some(token) = parse_expression(trimmed, false) {
            return token;
        }

        if let Some(id) = parse_node_descriptor(trimmed) {
            return Self::NodeOutputRef(id);
        }

        Self::Literal(raw.to_string())
    }
}

/// Split a string into literal text and `{{ ... }}` references
pub fn parse_template(text: &str) -> Vec<TemplatePart> {
    let mut parts = Vec::new();
    let mut last_end = 0;

    for caps in TEMPLATE_PATTERN.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

        if whole.start() > last_end {
            let literal = &text[last_end..whole.start()];
            parts.push(TemplatePart {
                raw: literal.to_string(),
                token: VariableToken::Literal(literal.to_string()),
            });
        }

        let raw = whole.as_str().to_string();
        let token = parse_expression(inner, true)
            .unwrap_or_else(|| VariableToken::Literal(raw.clone()));
        parts.push(TemplatePart { raw, token });

        last_end = whole.end();
    }

    if last_end < text.len() {
        let literal = &text[last_end..];
        parts.push(TemplatePart {
            raw: literal.to_string(),
            token: VariableToken::Literal(literal.to_string()),
        });
    }

    parts
}

fn parse_expression(expr: &str, braced: bool) -> Option<VariableToken> {
    if braced {
        if let Some(caps) = OUTPUT_PATTERN.captures(expr) {
            let path = caps.get(1).map(|m| m.as_str().to_string());
            return Some(VariableToken::OutputPlaceholder(path));
        }
    }

    if let Some(rest) = expr.strip_prefix(VARS_PREFIX) {
        return match rest {
            "" => Some(VariableToken::VarRef(None)),
            _ => rest
                .strip_prefix('.')
                .filter(|name| !name.is_empty())
                .map(|name| VariableToken::VarRef(Some(name.to_string())))
                .or_else(|| node_ref(expr)),
        };
    }

    if let Some(rest) = expr.strip_prefix(FLOW_PREFIX) {
        return match rest {
            "" => Some(VariableToken::FlowRef(None)),
            _ => rest
                .strip_prefix('.')
                .filter(|path| !path.is_empty())
                .map(|path| VariableToken::FlowRef(Some(path.to_string())))
                .or_else(|| node_ref(expr)),
        };
    }

    node_ref(expr)
}

fn node_ref(expr: &str) -> Option<VariableToken> {
    NODE_REF_PATTERN
        .captures(expr)
        .and_then(|caps| caps.get(1))
        .map(|m| VariableToken::NodeOutputRef(m.as_str().to_string()))
}

/// A JSON object naming a node by `id`, as emitted by the editor's node picker
fn parse_node_descriptor(text: &str) -> Option<String> {
    if !text.starts_with('{') {
        return None;
    }

    let parsed: Value = serde_json::from_str(text).ok()?;
    parsed
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        assert_eq!(VariableToken::parse("$vars"), VariableToken::VarRef(None));
        assert_eq!(
            VariableToken::parse("$vars.apiBase"),
            VariableToken::VarRef(Some("apiBase".to_string()))
        );
    }

    #[test]
    fn test_parse_flow() {
        assert_eq!(VariableToken::parse("$flow"), VariableToken::FlowRef(None));
        assert_eq!(
            VariableToken::parse("$flow.state.topic"),
            VariableToken::FlowRef(Some("state.topic".to_string()))
        );
    }

    #[test]
    fn test_parse_node_reference() {
        assert_eq!(
            VariableToken::parse("$llmAgentflow_0"),
            VariableToken::NodeOutputRef("llmAgentflow_0".to_string())
        );
        assert_eq!(
            VariableToken::parse(r#"{"id":"llmAgentflow_1","label":"LLM"}"#),
            VariableToken::NodeOutputRef("llmAgentflow_1".to_string())
        );
    }

    #[test]
    fn test_parse_output_placeholder_only_when_braced() {
        assert_eq!(
            VariableToken::parse("{{ output }}"),
            VariableToken::OutputPlaceholder(None)
        );
        assert_eq!(
            VariableToken::parse("{{output.data.id}}"),
            VariableToken::OutputPlaceholder(Some("data.id".to_string()))
        );
        assert_eq!(
            VariableToken::parse("output"),
            VariableToken::Literal("output".to_string())
        );
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(
            VariableToken::parse("hello world"),
            VariableToken::Literal("hello world".to_string())
        );
        assert_eq!(
            VariableToken::parse("$5.00"),
            VariableToken::Literal("$5.00".to_string())
        );
        assert_eq!(
            VariableToken::parse(r#"{"name":"no id"}"#),
            VariableToken::Literal(r#"{"name":"no id"}"#.to_string())
        );
        assert_eq!(
            VariableToken::parse("{{ something else }}"),
            VariableToken::Literal("{{ something else }}".to_string())
        );
    }

    #[test]
    fn test_parse_template_parts() {
        let parts = parse_template("https://{{ $vars.host }}/items/{{$flow.state.id}}?q=1");

        let tokens: Vec<_> = parts.iter().map(|p| p.token.clone()).collect();
        assert_eq!(
            tokens,
            vec![
                VariableToken::Literal("https://".to_string()),
                VariableToken::VarRef(Some("host".to_string())),
                VariableToken::Literal("/items/".to_string()),
                VariableToken::FlowRef(Some("state.id".to_string())),
                VariableToken::Literal("?q=1".to_string()),
            ]
        );
        assert_eq!(parts[1].raw, "{{ $vars.host }}");
    }
}
