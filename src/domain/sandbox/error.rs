use thiserror::Error;

/// Errors raised while executing user code
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SandboxError {
    #[error("Syntax error: {message}")]
    Syntax { message: String },

    #[error("Module '{module}' is not allowed")]
    DisallowedModule { module: String },

    #[error("Module '{module}' is allowed but not available in this runtime")]
    ModuleUnavailable { module: String },

    #[error("Execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{message}")]
    Runtime { message: String },

    #[error("Sandbox internal error: {message}")]
    Internal { message: String },
}

impl SandboxError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    pub fn disallowed_module(module: impl Into<String>) -> Self {
        Self::DisallowedModule {
            module: module.into(),
        }
    }

    pub fn module_unavailable(module: impl Into<String>) -> Self {
        Self::ModuleUnavailable {
            module: module.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            SandboxError::disallowed_module("fs").to_string(),
            "Module 'fs' is not allowed"
        );
        assert_eq!(
            SandboxError::timeout(10_000).to_string(),
            "Execution timed out after 10000ms"
        );
        assert_eq!(SandboxError::runtime("boom").to_string(), "boom");
        assert!(SandboxError::timeout(1).is_timeout());
        assert!(!SandboxError::syntax("x").is_timeout());
    }
}
