use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::credentials::{CredentialData, CredentialResolver};
use crate::domain::DomainError;

/// Credential resolver over a fixed in-memory map
#[derive(Debug, Default)]
pub struct InMemoryCredentialResolver {
    credentials: RwLock<HashMap<String, CredentialData>>,
}

impl InMemoryCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(self, id: impl Into<String>, data: CredentialData) -> Self {
        if let Ok(mut credentials) = self.credentials.write() {
            credentials.insert(id.into(), data);
        }
        self
    }

    /// Load from `{ "<id>": { "<field>": "<value>" } }`; non-string fields are stringified
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let Value::Object(entries) = value else {
            return Err(DomainError::validation("Credentials must be a JSON object"));
        };

        let mut resolver = Self::new();
        for (id, fields) in entries {
            let Value::Object(fields) = fields else {
                return Err(DomainError::validation(format!(
                    "Credential '{}' must be a JSON object",
                    id
                )));
            };

            let data = fields
                .iter()
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), text)
                })
                .collect();

            resolver = resolver.with_credential(id.clone(), data);
        }

        Ok(resolver)
    }
}

#[async_trait]
impl CredentialResolver for InMemoryCredentialResolver {
    async fn get_credential_data(
        &self,
        credential_id: &str,
        _org_id: Option<&str>,
    ) -> Result<CredentialData, DomainError> {
        let credentials = self
            .credentials
            .read()
            .map_err(|_| DomainError::internal("Credential store lock poisoned"))?;

        credentials
            .get(credential_id)
            .cloned()
            .ok_or_else(|| DomainError::credential(format!("Credential not found: {}", credential_id)))
    }
}
