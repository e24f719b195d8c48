//! Backend Module
//!
//! The network seam of the gateway: request shapes, the `Backend` trait and
//! the reqwest transport that talks to the REST backend.

mod http;
mod request;
mod retry;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use http::HttpBackend;
pub use request::{BackendRequest, FileUpload, Method, Payload};
pub use retry::{with_retry, RetryConfig};

/// Executes backend requests.
///
/// Implementations perform exactly one logical request per call and report
/// failures unchanged; caching and coalescing live above this trait.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Runs a JSON request. Empty response bodies decode as `Value::Null`.
    async fn execute(&self, request: BackendRequest) -> Result<Value>;

    /// Fetches a binary payload (e.g. a generated PDF).
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
}
