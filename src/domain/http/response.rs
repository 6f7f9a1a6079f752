use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde_json::{Map, Value};

use super::{HttpError, ResponseType};

/// A received HTTP response, body still undecoded
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Map<String, Value>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Map::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), Value::String(value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into an error carrying its diagnostics
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            return Ok(self);
        }

        let data = self.decode(ResponseType::Json);
        Err(HttpError::status(
            self.status,
            self.status_text,
            data,
            self.headers,
        ))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as requested
    ///
    /// A JSON body that fails to parse falls back to its text.
    pub fn decode(&self, response_type: ResponseType) -> Value {
        match response_type {
            ResponseType::Json => {
                serde_json::from_slice(&self.body).unwrap_or_else(|_| Value::String(self.text()))
            }
            ResponseType::Text => Value::String(self.text()),
            ResponseType::Arraybuffer => {
                Value::Array(self.body.iter().map(|b| Value::from(*b)).collect())
            }
            ResponseType::Base64 => Value::String(STANDARD.encode(&self.body)),
        }
    }
}
