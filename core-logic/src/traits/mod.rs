use crate::error::NetworkError;
use crate::http::{HttpRequest, HttpResponse};
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` through `proxy` and returns the raw, undecoded response.
    ///
    /// Non-2xx statuses are reported as [`NetworkError::HttpStatus`].
    async fn execute(&self, proxy: &str, request: HttpRequest)
        -> Result<HttpResponse, NetworkError>;
}
