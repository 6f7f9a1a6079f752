use async_trait::async_trait;
use std::collections::HashMap;
use std::env;

use crate::domain::credentials::{CredentialData, CredentialResolver};
use crate::domain::DomainError;

/// Which environment variable backs each credential field
#[derive(Debug, Clone, Default)]
pub struct EnvMapping {
    pub vars: HashMap<String, String>,
}

impl EnvMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, param_name: impl Into<String>, env_var: impl Into<String>) -> Self {
        self.vars.insert(param_name.into(), env_var.into());
        self
    }
}

/// Credential resolver that reads fields from environment variables
#[derive(Debug, Default)]
pub struct EnvCredentialResolver {
    mappings: HashMap<String, EnvMapping>,
}

impl EnvCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, credential_id: impl Into<String>, mapping: EnvMapping) -> Self {
        self.mappings.insert(credential_id.into(), mapping);
        self
    }

    /// Common credential ids mapped to their conventional variables
    pub fn with_defaults(self) -> Self {
        self.with_mapping("openAIApi", EnvMapping::new().with_var("openAIApiKey", "OPENAI_API_KEY"))
            .with_mapping(
                "httpBearerToken",
                EnvMapping::new().with_var("token", "HTTP_BEARER_TOKEN"),
            )
            .with_mapping(
                "httpBasicAuth",
                EnvMapping::new()
                    .with_var("basicAuthUsername", "HTTP_BASIC_AUTH_USERNAME")
                    .with_var("basicAuthPassword", "HTTP_BASIC_AUTH_PASSWORD"),
            )
            .with_mapping(
                "chatflowApi",
                EnvMapping::new().with_var("apiKey", "AGENTFLOW_API_KEY"),
            )
    }
}

#[async_trait]
impl CredentialResolver for EnvCredentialResolver {
    async fn get_credential_data(
        &self,
        credential_id: &str,
        _org_id: Option<&str>,
    ) -> Result<CredentialData, DomainError> {
        let mapping = self.mappings.get(credential_id).ok_or_else(|| {
            DomainError::credential(format!(
                "No environment mapping configured for credential: {}",
                credential_id
            ))
        })?;

        let data: CredentialData = mapping
            .vars
            .iter()
            .filter_map(|(param, var)| env::var(var).ok().map(|value| (param.clone(), value)))
            .collect();

        if data.is_empty() {
            return Err(DomainError::credential(format!(
                "No environment variables set for credential: {}",
                credential_id
            )));
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_mapped_variables() {
        // SAFETY: Test runs in isolation
        unsafe { env::set_var("AGENTFLOW_TEST_TOKEN", "tok-123") };

        let resolver = EnvCredentialResolver::new().with_mapping(
            "bearer",
            EnvMapping::new()
                .with_var("token", "AGENTFLOW_TEST_TOKEN")
                .with_var("unused", "AGENTFLOW_TEST_UNSET"),
        );

        let data = resolver.get_credential_data("bearer", None).await.unwrap();
        assert_eq!(data.get("token").map(String::as_str), Some("tok-123"));
        assert!(!data.contains_key("unused"));

        // SAFETY: Test cleanup
        unsafe { env::remove_var("AGENTFLOW_TEST_TOKEN") };
    }

    #[tokio::test]
    async fn test_unknown_or_unset_credential() {
        let resolver = EnvCredentialResolver::new()
            .with_mapping("empty", EnvMapping::new().with_var("token", "AGENTFLOW_NEVER_SET"));

        assert!(resolver.get_credential_data("missing", None).await.is_err());
        assert!(resolver.get_credential_data("empty", None).await.is_err());
    }
}
