//! Declared node inputs and configuration validation

use serde::Serialize;
use serde_json::Value;

use super::{NodeData, NodeError};

/// Value type of a declared input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InputType {
    String,
    Number,
    Boolean,
    Json,
    Code,
    Options,
    Array,
    Credential,
}

/// One input a node declares
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInputParam {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub input_type: InputType,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    pub accept_variable: bool,
}

impl NodeInputParam {
    pub fn new(name: &'static str, label: &'static str, input_type: InputType) -> Self {
        Self {
            name,
            label,
            input_type,
            optional: false,
            default_value: None,
            options: Vec::new(),
            description: None,
            accept_variable: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_options(mut self, options: &[&'static str]) -> Self {
        self.options = options.to_vec();
        self
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    pub fn accept_variable(mut self) -> Self {
        self.accept_variable = true;
        self
    }

    /// Required inputs without a default must be configured
    pub fn is_required(&self) -> bool {
        !self.optional && self.default_value.is_none()
    }
}

/// Value of an input, falling back to its declared default
pub fn input_or_default<'a>(
    params: &'a [NodeInputParam],
    data: &'a NodeData,
    name: &str,
) -> Option<&'a Value> {
    data.input(name).or_else(|| {
        params
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.default_value.as_ref())
    })
}

/// Check a node's configuration against its declared inputs
pub fn validate_inputs(params: &[NodeInputParam], data: &NodeData) -> Result<(), NodeError> {
    for param in params {
        let Some(value) = data.input(param.name) else {
            if param.is_required() {
                return Err(NodeError::missing_input(&data.id, param.name));
            }
            continue;
        };

        if param.is_required() && !data.has_input(param.name) {
            return Err(NodeError::missing_input(&data.id, param.name));
        }

        check_type(param, value).map_err(|message| {
            NodeError::configuration(format!(
                "Input '{}' on node {}: {}",
                param.name, data.id, message
            ))
        })?;
    }

    Ok(())
}

fn check_type(param: &NodeInputParam, value: &Value) -> Result<(), String> {
    // variable references are resolved at run time
    if param.accept_variable && matches!(value, Value::String(s) if s.contains('$')) {
        return Ok(());
    }

    match param.input_type {
        InputType::Number => match value {
            Value::Number(_) => Ok(()),
            Value::String(s) if s.trim().is_empty() || s.trim().parse::<f64>().is_ok() => Ok(()),
            _ => Err("expected a number".to_string()),
        },
        InputType::Boolean => match value {
            Value::Bool(_) => Ok(()),
            Value::String(s) if s == "true" || s == "false" => Ok(()),
            _ => Err("expected a boolean".to_string()),
        },
        InputType::Options => match value.as_str() {
            Some(choice) if param.options.is_empty() || param.options.contains(&choice) => Ok(()),
            Some(choice) => Err(format!(
                "'{}' is not one of {}",
                choice,
                param.options.join(", ")
            )),
            None => Err("expected one of the declared options".to_string()),
        },
        InputType::Array => match value {
            Value::Array(_) => Ok(()),
            Value::String(s) if serde_json::from_str::<Vec<Value>>(s).is_ok() => Ok(()),
            _ => Err("expected an array".to_string()),
        },
        InputType::String
        | InputType::Json
        | InputType::Code
        | InputType::Credential => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> Vec<NodeInputParam> {
        vec![
            NodeInputParam::new("url", "URL", InputType::String).accept_variable(),
            NodeInputParam::new("method", "Method", InputType::Options)
                .with_options(&["GET", "POST"])
                .with_default(json!("GET")),
            NodeInputParam::new("retries", "Retries", InputType::Number).optional(),
            NodeInputParam::new("headers", "Headers", InputType::Array).optional(),
        ]
    }

    #[test]
    fn test_missing_required_input() {
        let data = NodeData::new("http_0", "httpAgentflow");
        let err = validate_inputs(&params(), &data).unwrap_err();
        assert_eq!(err, NodeError::missing_input("http_0", "url"));

        let data = data.with_input("url", json!(""));
        assert!(matches!(
            validate_inputs(&params(), &data),
            Err(NodeError::MissingInput { .. })
        ));
    }

    #[test]
    fn test_valid_configuration() {
        let data = NodeData::new("http_0", "httpAgentflow")
            .with_input("url", json!("https://example.com"))
            .with_input("retries", json!("3"))
            .with_input("headers", json!([{"key": "a", "value": "b"}]));

        assert!(validate_inputs(&params(), &data).is_ok());
    }

    #[test]
    fn test_type_mismatches() {
        let base = NodeData::new("http_0", "httpAgentflow").with_input("url", json!("x"));

        let bad_option = base.clone().with_input("method", json!("TRACE"));
        assert!(matches!(
            validate_inputs(&params(), &bad_option),
            Err(NodeError::Configuration { .. })
        ));

        let bad_number = base.clone().with_input("retries", json!("many"));
        assert!(validate_inputs(&params(), &bad_number).is_err());

        let bad_array = base.with_input("headers", json!({"a": 1}));
        assert!(validate_inputs(&params(), &bad_array).is_err());
    }

    #[test]
    fn test_defaults() {
        let params = params();
        let data = NodeData::new("http_0", "httpAgentflow");
        assert_eq!(input_or_default(&params, &data, "method"), Some(&json!("GET")));
        assert_eq!(input_or_default(&params, &data, "retries"), None);
    }
}
