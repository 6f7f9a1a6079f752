use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;

use crate::domain::node::NodeData;
use crate::domain::DomainError;

/// Decrypted key/value fields of a stored credential
pub type CredentialData = HashMap<String, String>;

/// Resolves a credential reference into its fields
#[async_trait]
pub trait CredentialResolver: Send + Sync + Debug {
    async fn get_credential_data(
        &self,
        credential_id: &str,
        org_id: Option<&str>,
    ) -> Result<CredentialData, DomainError>;
}

/// Look up a credential parameter, letting a non-empty node input of the same
/// name take precedence over the stored credential field
pub fn get_credential_param(
    name: &str,
    data: &CredentialData,
    node_data: &NodeData,
) -> Option<String> {
    let from_inputs = node_data.inputs.get(name).and_then(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    });

    from_inputs.or_else(|| data.get(name).filter(|v| !v.is_empty()).cloned())
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct MockCredentialResolver {
        credentials: RwLock<HashMap<String, CredentialData>>,
    }

    impl MockCredentialResolver {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_credential(self, id: &str, fields: &[(&str, &str)]) -> Self {
            let data = fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.credentials.write().unwrap().insert(id.to_string(), data);
            self
        }
    }

    #[async_trait]
    impl CredentialResolver for MockCredentialResolver {
        async fn get_credential_data(
            &self,
            credential_id: &str,
            _org_id: Option<&str>,
        ) -> Result<CredentialData, DomainError> {
            self.credentials
                .read()
                .unwrap()
                .get(credential_id)
                .cloned()
                .ok_or_else(|| {
                    DomainError::credential(format!("Credential not found: {}", credential_id))
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_input_takes_precedence() {
        let mut data = CredentialData::new();
        data.insert("apiKey".to_string(), "stored".to_string());

        let node = NodeData::new("n1", "executeFlowAgentflow").with_input("apiKey", json!("inline"));
        assert_eq!(
            get_credential_param("apiKey", &data, &node).as_deref(),
            Some("inline")
        );

        let node = NodeData::new("n1", "executeFlowAgentflow").with_input("apiKey", json!(""));
        assert_eq!(
            get_credential_param("apiKey", &data, &node).as_deref(),
            Some("stored")
        );

        assert!(get_credential_param("missing", &data, &node).is_none());
    }
}
