//! Synapse - the forwarding tail of a reverse-proxy API gateway.
//!
//! Synapse relays client requests to configured backend services through a
//! fixed stage pipeline built on a **hexagonal architecture**. Each request
//! flows through CORS evaluation, route resolution and a terminal forwarding
//! stage that always produces a finalized response. This library exposes the
//! building blocks so you can embed the pipeline or compose parts of it
//! inside your own application.
//!
//! # Features
//! - Longest-prefix route resolution with per-route request header overrides
//! - Streaming relay in both directions with drain-on-drop backend cleanup
//! - Gateway-wide CORS policy with preflight short-circuiting
//! - Response header reconciliation that protects the gateway's CORS
//!   decisions from backend interference
//! - Synthesized JSON failure responses carrying the request id
//! - Configuration loading (YAML / JSON / TOML) with startup validation
//! - Structured tracing via `tracing`
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use synapse::{
//!     adapters::{BackendClientAdapter, PipelineHandler},
//!     core::{CorsPolicy, ForwardingFilter},
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = Arc::new(synapse::config::loader::load_config("config.yaml").await?);
//! let cors = Arc::new(CorsPolicy::from_settings(&config.cors)?);
//! let client = Arc::new(BackendClientAdapter::new(&config.services)?);
//! let forwarding = Arc::new(ForwardingFilter::new(client));
//! let handler = PipelineHandler::new(config, cors, forwarding);
//! // Wire the handler into an Axum router (see the binary crate)
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations)
//! while keeping business logic inside `core`. End users should prefer the
//! re-exports documented below instead of reaching into internal modules
//! directly.
//!
//! # Error Handling
//! All fallible APIs return `eyre::Result<T>` or a domain specific error type.
//! A custom error context is always attached using `WrapErr` for
//! debuggability.
// Re-export public modules with explicit visibility controls
pub mod config;
pub mod ports;
pub mod tracing_setup;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{BackendClientAdapter, PipelineHandler},
    core::{CorsPolicy, ForwardingFilter},
    ports::backend_client::BackendClient,
};
