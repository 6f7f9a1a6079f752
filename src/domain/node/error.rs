use thiserror::Error;

use crate::domain::http::HttpError;
use crate::domain::sandbox::SandboxError;
use crate::domain::DomainError;

/// Errors that abort a node run
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Node {node_id} is missing required input '{input}'")]
    MissingInput { node_id: String, input: String },

    #[error("Failed to parse {field}: {message}")]
    Parse { field: String, message: String },

    #[error("Code execution failed: {0}")]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Credential error: {message}")]
    Credential { message: String },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl NodeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn missing_input(node_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self::MissingInput {
            node_id: node_id.into(),
            input: input.into(),
        }
    }

    pub fn parse(field: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            field: field.into(),
            message: message.to_string(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short error kind used as the envelope error `name`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "ConfigurationError",
            Self::MissingInput { .. } => "MissingInputError",
            Self::Parse { .. } => "ParseError",
            Self::Sandbox(_) => "SandboxError",
            Self::Http(_) => "HttpError",
            Self::Credential { .. } => "CredentialError",
            Self::Model { .. } => "ModelError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

impl From<DomainError> for NodeError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Credential { message } => Self::Credential { message },
            DomainError::Configuration { message } | DomainError::Validation { message } => {
                Self::Configuration { message }
            }
            provider @ DomainError::Provider { .. } => Self::model(provider.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}
