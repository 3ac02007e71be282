//! Configuration data structures for Synapse.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files. They are
//! intentionally serde‑friendly and include defaults so that minimal configs remain concise.
//! The builder here is considered part of the public API for embedding.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_allow_origin() -> String {
    "*".to_string()
}

fn default_allow_credentials() -> bool {
    true
}

fn default_max_age_secs() -> u64 {
    3600
}

/// CORS values applied gateway-wide, evaluated before any other stage.
///
/// The defaults reproduce the deployed policy: wildcard origin together with
/// credentials, every request header allowed, and the configured log headers
/// exposed to browser scripts.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CorsSettings {
    /// Allowed origin value (wildcard by default)
    pub allow_origin: String,
    /// Whether `Access-Control-Allow-Credentials: true` is emitted
    pub allow_credentials: bool,
    /// Response header names exposed via `Access-Control-Expose-Headers`
    pub log_headers: Vec<String>,
    /// Preflight cache lifetime in seconds
    pub max_age_secs: u64,
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
            allow_credentials: default_allow_credentials(),
            log_headers: Vec::new(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

/// Route table entry binding a path prefix to a registered service.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouteConfig {
    /// Service id the matched request is relayed to
    pub service: String,
    /// Header overrides applied to the outgoing request. An entry replaces the
    /// inbound header's whole value list with the single configured value.
    #[serde(default)]
    pub append_headers: HashMap<String, String>,
}

/// Backend service registration resolved by the outbound client.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Base URL of the backend (http or https)
    pub url: String,
}

/// Top-level gateway configuration. Immutable after startup: loaded once,
/// validated, then shared behind an `Arc`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub listen_addr: String,
    /// Path prefix -> route entry, matched by longest prefix
    pub routes: HashMap<String, RouteConfig>,
    /// Service id -> backend registration
    pub services: HashMap<String, ServiceConfig>,
    #[serde(default)]
    pub cors: CorsSettings,
}

impl GatewayConfig {
    /// Create a new gateway configuration builder
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            routes: HashMap::new(),
            services: HashMap::new(),
            cors: CorsSettings::default(),
        }
    }
}

/// Builder for GatewayConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct GatewayConfigBuilder {
    listen_addr: Option<String>,
    routes: HashMap<String, RouteConfig>,
    services: HashMap<String, ServiceConfig>,
    cors: Option<CorsSettings>,
}

impl GatewayConfigBuilder {
    /// Set the listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Add a route with the given path prefix and target service id
    pub fn route(mut self, path_prefix: impl Into<String>, service: impl Into<String>) -> Self {
        self.routes.insert(
            path_prefix.into(),
            RouteConfig {
                service: service.into(),
                append_headers: HashMap::new(),
            },
        );
        self
    }

    /// Add a route with header overrides applied to the outgoing request
    pub fn route_with_headers(
        mut self,
        path_prefix: impl Into<String>,
        service: impl Into<String>,
        append_headers: HashMap<String, String>,
    ) -> Self {
        self.routes.insert(
            path_prefix.into(),
            RouteConfig {
                service: service.into(),
                append_headers,
            },
        );
        self
    }

    /// Register a backend service under the given id
    pub fn service(mut self, id: impl Into<String>, url: impl Into<String>) -> Self {
        self.services
            .insert(id.into(), ServiceConfig { url: url.into() });
        self
    }

    /// Set CORS values
    pub fn cors(mut self, cors: CorsSettings) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Build the final GatewayConfig
    pub fn build(self) -> Result<GatewayConfig, String> {
        let listen_addr = self
            .listen_addr
            .ok_or_else(|| "listen_addr is required".to_string())?;

        if self.routes.is_empty() {
            return Err("At least one route must be configured".to_string());
        }

        Ok(GatewayConfig {
            listen_addr,
            routes: self.routes,
            services: self.services,
            cors: self.cors.unwrap_or_default(),
        })
    }
}
