use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::Form;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::domain::http::{
    ByteStream, HttpError, HttpMethod, HttpRequestSpec, HttpResponse, HttpTransport, RequestBody,
};

/// [`HttpTransport`] backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    default_timeout: Option<Duration>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout: None,
        }
    }

    /// Apply `timeout` to requests that do not set their own
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            default_timeout: Some(timeout),
        }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn builder(&self, request: HttpRequestSpec) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(timeout) = request.timeout.or(self.default_timeout) {
            builder = builder.timeout(timeout);
        }

        match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Raw(text) => builder.body(text),
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart(fields) => {
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (name, value)| form.text(name, value));
                builder.multipart(form)
            }
        }
    }

    async fn buffer(response: reqwest::Response) -> Result<HttpResponse, HttpError> {
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();

        let mut headers = Map::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HttpError::network(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text,
            headers,
            body,
        })
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequestSpec) -> Result<HttpResponse, HttpError> {
        debug!(method = %request.method, url = %request.url, "Sending HTTP request");

        let response = self
            .builder(request)
            .send()
            .await
            .map_err(|e| HttpError::network(format!("Request failed: {}", e)))?;

        Self::buffer(response).await
    }

    async fn send_stream(&self, request: HttpRequestSpec) -> Result<ByteStream, HttpError> {
        debug!(method = %request.method, url = %request.url, "Sending streaming HTTP request");

        let response = self
            .builder(request)
            .send()
            .await
            .map_err(|e| HttpError::network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let error = match Self::buffer(response).await?.error_for_status() {
                Err(error) => error,
                Ok(response) => HttpError::network(format!("Unexpected status {}", response.status)),
            };
            return Err(error);
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| HttpError::network(format!("Stream error: {}", e)))
        });

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_with_query_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .and(header("x-trace", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let request = HttpRequestSpec::new(HttpMethod::Get, format!("{}/items", server.uri()))
            .with_query("page", "2")
            .with_header("x-trace", "abc");

        let response = ReqwestTransport::new().send(request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(
            serde_json::from_slice::<Value>(&response.body).unwrap(),
            json!({"ok": true})
        );
    }

    #[tokio::test]
    async fn test_post_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(body_json(json!({"name": "ada"})))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let request = HttpRequestSpec::new(HttpMethod::Post, format!("{}/echo", server.uri()))
            .with_body(RequestBody::Json(json!({"name": "ada"})));

        let response = ReqwestTransport::new().send(request).await.unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let response = ReqwestTransport::new()
            .send(HttpRequestSpec::new(HttpMethod::Get, server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_connection_error() {
        let err = ReqwestTransport::new()
            .send(HttpRequestSpec::new(HttpMethod::Get, "http://127.0.0.1:1/unreachable"))
            .await
            .unwrap_err();

        assert!(err.status.is_none());
        assert!(err.message.starts_with("Request failed"));
    }

    #[tokio::test]
    async fn test_send_stream_yields_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: one\n\ndata: two\n\n"))
            .mount(&server)
            .await;

        let stream = ReqwestTransport::new()
            .send_stream(HttpRequestSpec::new(HttpMethod::Post, format!("{}/events", server.uri())))
            .await
            .unwrap();

        let chunks: Vec<Bytes> = stream.map(|chunk| chunk.unwrap()).collect().await;
        let body: Vec<u8> = chunks.concat();
        assert_eq!(body, b"data: one\n\ndata: two\n\n");
    }

    #[tokio::test]
    async fn test_send_stream_raises_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({"error": "slow down"})))
            .mount(&server)
            .await;

        let result = ReqwestTransport::new()
            .send_stream(HttpRequestSpec::new(HttpMethod::Post, server.uri()))
            .await;

        let Err(err) = result else {
            panic!("expected an error status");
        };
        assert_eq!(err.status, Some(429));
        assert_eq!(err.data, Some(json!({"error": "slow down"})));
    }
}
