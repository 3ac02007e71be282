use async_trait::async_trait;
use axum::body::Body as AxumBody;
use hyper::{HeaderMap, Method, Response};
use thiserror::Error;

/// Custom error type for backend client operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BackendClientError {
    /// Error when the service id is not registered
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Error when the assembled backend URI is invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error when the connection to the backend fails or is interrupted
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Result type alias for backend client operations
pub type BackendClientResult<T> = Result<T, BackendClientError>;

/// BackendClient defines the port (interface) for relaying requests to backends
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
    /// Relay a request to the backend registered under `service_id`
    ///
    /// # Arguments
    /// * `request_id` - Correlation id of the inbound request, used in logs
    /// * `method` - HTTP method to forward
    /// * `service_id` - Logical name of the target service
    /// * `path` - Path and query relative to the service base URL
    /// * `headers` - Outgoing header set, already reconciled by the caller
    /// * `body` - Request body as a lazy stream, never buffered here
    ///
    /// # Returns
    /// The backend's response with a streaming body, or an error
    async fn send(
        &self,
        request_id: &str,
        method: Method,
        service_id: &str,
        path: &str,
        headers: HeaderMap,
        body: AxumBody,
    ) -> BackendClientResult<Response<AxumBody>>;
}
