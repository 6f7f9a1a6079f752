use serde_json::{Map, Value};
use thiserror::Error;

/// Failed HTTP exchange, carrying whatever diagnostics the server returned
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{message}")]
pub struct HttpError {
    pub message: String,
    pub status: Option<u16>,
    pub status_text: Option<String>,
    pub data: Option<Value>,
    pub headers: Option<Map<String, Value>>,
}

impl HttpError {
    /// Error without a response (connection refused, timeout, bad URL)
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            status_text: None,
            data: None,
            headers: None,
        }
    }

    /// Error for a response with a non-success status
    pub fn status(
        status: u16,
        status_text: impl Into<String>,
        data: Value,
        headers: Map<String, Value>,
    ) -> Self {
        Self {
            message: format!("Request failed with status code {}", status),
            status: Some(status),
            status_text: Some(status_text.into()),
            data: Some(data),
            headers: Some(headers),
        }
    }

    pub fn has_response(&self) -> bool {
        self.status.is_some()
    }
}
