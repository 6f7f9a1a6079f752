//! Outbound HTTP seam shared by the HTTP and ExecuteFlow nodes

mod auth;
mod error;
mod request;
mod response;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;

pub use auth::HttpAuth;
pub use error::HttpError;
pub use request::{BodyType, HttpMethod, HttpRequestSpec, RequestBody, ResponseType};
pub use response::HttpResponse;

/// Response body delivered chunk by chunk as it arrives
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

/// Sends requests; non-2xx responses are returned, not raised
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn send(&self, request: HttpRequestSpec) -> Result<HttpResponse, HttpError>;

    /// Send and hand back the body as a stream
    ///
    /// Non-2xx responses are raised here, since there is no response to return.
    /// The default buffers the whole body into a single chunk.
    async fn send_stream(&self, request: HttpRequestSpec) -> Result<ByteStream, HttpError> {
        let response = self.send(request).await?.error_for_status()?;
        Ok(Box::pin(futures::stream::once(async move { Ok(response.body) })))
    }
}
