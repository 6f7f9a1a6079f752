use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mutable key/value working memory threaded through a flow run
///
/// Keys are seeded by the Start node; later nodes overwrite values but never
/// rename or remove keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowState(Map<String, Value>);

impl FlowState {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build from an arbitrary JSON value; non-objects yield an empty state
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(map.clone()),
            _ => Self::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for FlowState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let mut state = FlowState::new();
        assert!(state.is_empty());

        assert_eq!(state.set("topic", json!("rust")), None);
        assert_eq!(state.set("topic", json!("go")), Some(json!("rust")));
        assert_eq!(state.get("topic"), Some(&json!("go")));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn test_from_value() {
        let state = FlowState::from_value(&json!({"a": 1, "b": "two"}));
        assert!(state.contains_key("a"));
        assert_eq!(state.to_value(), json!({"a": 1, "b": "two"}));

        assert!(FlowState::from_value(&json!("not an object")).is_empty());
    }

    #[test]
    fn test_serializes_transparently() {
        let mut state = FlowState::new();
        state.set("k", json!(true));
        assert_eq!(serde_json::to_string(&state).unwrap(), r#"{"k":true}"#);
    }
}
