pub mod http_client;
pub mod http_handler;
pub mod middleware;

/// Re-export commonly used types from adapters
pub use http_client::BackendClientAdapter;
pub use http_handler::PipelineHandler;
pub use middleware::{RequestId, request_id_middleware};
