//! Variable store implementations

use async_trait::async_trait;
use serde_json::Value;
use std::sync::RwLock;

use crate::domain::variable::{FlowVariable, VariableStore};
use crate::domain::DomainError;

/// Variable store over a fixed in-memory list
#[derive(Debug, Default)]
pub struct InMemoryVariableStore {
    variables: RwLock<Vec<FlowVariable>>,
}

impl InMemoryVariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(FlowVariable::new(name, value));
        self
    }

    /// Load from a `{ "<name>": <value> }` object
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let Value::Object(entries) = value else {
            return Err(DomainError::validation("Variables must be a JSON object"));
        };

        Ok(entries
            .iter()
            .fold(Self::new(), |store, (name, value)| {
                store.with_variable(name.clone(), value.clone())
            }))
    }

    /// Insert or replace a variable by name
    pub fn set(&self, variable: FlowVariable) {
        if let Ok(mut variables) = self.variables.write() {
            variables.retain(|v| v.name != variable.name);
            variables.push(variable);
        }
    }
}

#[async_trait]
impl VariableStore for InMemoryVariableStore {
    async fn get_vars(&self, _node_id: &str) -> Result<Vec<FlowVariable>, DomainError> {
        self.variables
            .read()
            .map(|variables| variables.clone())
            .map_err(|_| DomainError::variable_store("Variable store lock poisoned"))
    }
}
