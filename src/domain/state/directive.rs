use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::flow_state::FlowState;
use crate::domain::variable::VariableResolver;

/// A declared `{ key, value }` state mutation
///
/// The value may reference `{{ output }}`, which is substituted with the
/// node's own output after its primary computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdateDirective {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl StateUpdateDirective {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse the directive list from a node input (array or JSON-encoded array)
    pub fn list_from_input(input: Option<&Value>) -> Result<Vec<Self>, serde_json::Error> {
        match input {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
            Some(Value::String(s)) => serde_json::from_str(s),
            Some(other) => serde_json::from_value(other.clone()),
        }
    }
}

/// Merge directives into a copy of `state` (shallow key overwrite)
///
/// Each value is resolved with `resolver`, which should already carry the
/// node output so `{{ output }}` placeholders are replaced.
pub fn apply_state_updates(
    state: &FlowState,
    directives: Vec<StateUpdateDirective>,
    resolver: &VariableResolver<'_>,
) -> FlowState {
    let mut next = state.clone();

    for directive in directives {
        if directive.key.is_empty() {
            continue;
        }

        if !next.contains_key(&directive.key) {
            debug!(key = %directive.key, "State directive introduces an undeclared key");
        }

        let value = resolver.resolve_value(&directive.value);
        next.set(directive.key, value);
    }

    next
}
