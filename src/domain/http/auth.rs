//! Credential-derived authentication headers

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::domain::credentials::CredentialData;

/// Authentication scheme derived from credential fields
///
/// Precedence is Basic, then Bearer, then API key; the first scheme with a
/// non-empty field wins and the others are ignored. Basic applies when either
/// the username or the password is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
    ApiKey { key: String, value: String },
}

impl HttpAuth {
    pub fn from_credential(data: &CredentialData) -> Option<Self> {
        let field = |name: &str| data.get(name).filter(|v| !v.is_empty()).cloned();

        match (field("basicAuthUsername"), field("basicAuthPassword")) {
            (None, None) => {}
            (username, password) => {
                return Some(Self::Basic {
                    username: username.unwrap_or_default(),
                    password: password.unwrap_or_default(),
                });
            }
        }

        if let Some(token) = field("token") {
            return Some(Self::Bearer { token });
        }

        match (field("key"), field("value")) {
            (Some(key), Some(value)) => Some(Self::ApiKey { key, value }),
            _ => None,
        }
    }

    /// Header name and value to send
    pub fn header(&self) -> (String, String) {
        match self {
            Self::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{}:{}", username, password));
                ("Authorization".to_string(), format!("Basic {}", encoded))
            }
            Self::Bearer { token } => ("Authorization".to_string(), format!("Bearer {}", token)),
            Self::ApiKey { key, value } => (key.clone(), value.clone()),
        }
    }
}
