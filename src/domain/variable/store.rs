//! Project variable store collaborator (`$vars`)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::DomainError;

/// Resolved `$vars` mapping
pub type VariableSet = Map<String, Value>;

/// A named project/workspace variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVariable {
    pub name: String,
    pub value: Value,
}

impl FlowVariable {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Source of project variables, fetched once per node invocation
#[async_trait]
pub trait VariableStore: Send + Sync + std::fmt::Debug {
    async fn get_vars(&self, node_id: &str) -> Result<Vec<FlowVariable>, DomainError>;
}

/// Build the `$vars` mapping, letting run-level overrides win by name
pub fn build_variable_set(variables: Vec<FlowVariable>, overrides: Option<&Value>) -> VariableSet {
    let mut set = VariableSet::new();

    for variable in variables {
        set.insert(variable.name, variable.value);
    }

    if let Some(Value::Object(overrides)) = overrides {
        for (name, value) in overrides {
            set.insert(name.clone(), value.clone());
        }
    }

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_variable_set_with_overrides() {
        let vars = vec![
            FlowVariable::new("region", "eu"),
            FlowVariable::new("limit", 10),
        ];
        let overrides = json!({"region": "us"});

        let set = build_variable_set(vars, Some(&overrides));

        assert_eq!(set.get("region"), Some(&json!("us")));
        assert_eq!(set.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn test_build_variable_set_ignores_non_object_overrides() {
        let set = build_variable_set(vec![FlowVariable::new("a", "1")], Some(&json!("bad")));
        assert_eq!(set.len(), 1);
    }
}
