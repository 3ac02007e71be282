use std::collections::HashMap;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{HeaderMap, Method, Request, Response, Uri, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;

use crate::{
    config::models::ServiceConfig,
    ports::backend_client::{BackendClient, BackendClientError, BackendClientResult},
};

/// Backend client adapter using Hyper with Rustls (HTTP/1.1 + HTTP/2).
///
/// Responsibilities:
/// * Resolves service ids to configured base URLs
/// * Forces request version to HTTP/1.1 while allowing ALPN to negotiate h2
/// * Rewrites the Host header to the backend authority
/// * Converts between Hyper body and Axum body types
///
/// This adapter is intentionally minimal; retries / circuit breaking can be
/// layered on a different abstraction if required.
pub struct BackendClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
    /// Service id -> base URL with any trailing slash trimmed
    services: HashMap<String, String>,
}

impl BackendClientAdapter {
    /// Create a new backend client adapter over the configured services.
    pub fn new(services: &HashMap<String, ServiceConfig>) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        let services = services
            .iter()
            .map(|(id, service)| (id.clone(), service.url.trim_end_matches('/').to_string()))
            .collect();

        tracing::info!("Created backend client with HTTP/2 and HTTP/1.1 support");
        Ok(Self { client, services })
    }

    fn resolve(&self, service_id: &str, path: &str) -> BackendClientResult<Uri> {
        let base = self
            .services
            .get(service_id)
            .ok_or_else(|| BackendClientError::UnknownService(service_id.to_string()))?;

        format!("{base}{path}")
            .parse::<Uri>()
            .map_err(|e| BackendClientError::InvalidRequest(format!("Bad backend URI: {e}")))
    }
}

#[async_trait]
impl BackendClient for BackendClientAdapter {
    async fn send(
        &self,
        request_id: &str,
        method: Method,
        service_id: &str,
        path: &str,
        headers: HeaderMap,
        body: AxumBody,
    ) -> BackendClientResult<Response<AxumBody>> {
        let uri = self.resolve(service_id, path)?;
        let client = self.client.clone();

        let span = tracing::info_span!(
            "backend_request",
            request.id = %request_id,
            backend.service = %service_id,
            http.method = %method,
            http.path = %path,
            http.status_code = tracing::field::Empty,
        );
        let _enter = span.enter();

        let mut req = Request::new(body);
        *req.method_mut() = method;
        *req.headers_mut() = headers;

        // Host must name the backend authority, not the gateway's
        let host_header_val = match (uri.host(), uri.port()) {
            (Some(host), Some(port)) => {
                HeaderValue::from_str(&format!("{host}:{}", port.as_u16())).ok()
            }
            (Some(host), None) => HeaderValue::from_str(host).ok(),
            (None, _) => None,
        };
        match host_header_val {
            Some(value) => {
                req.headers_mut().insert(header::HOST, value);
            }
            None => {
                tracing::error!("Outgoing URI has no host: {}", uri);
                return Err(BackendClientError::InvalidRequest(
                    "Outgoing URI has no host".to_string(),
                ));
            }
        }

        *req.uri_mut() = uri;
        *req.version_mut() = Version::HTTP_11;

        tracing::debug!(
            "Relaying {} {} (Version set to HTTP/1.1, ALPN negotiates actual version)",
            req.method(),
            req.uri()
        );

        let method_for_error_log = req.method().clone();
        let uri_for_error_log = req.uri().clone();

        match client.request(req).await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                tracing::Span::current().record("http.status_code", status_code);

                let (mut parts, hyper_body) = response.into_parts();

                // Remove Transfer-Encoding since the body is being decoded/streamed
                // and the downstream server (Axum) will handle framing.
                parts.headers.remove(header::TRANSFER_ENCODING);

                let axum_body = AxumBody::new(hyper_body);

                Ok(Response::from_parts(parts, axum_body))
            }
            Err(e) => {
                tracing::Span::current().record("http.status_code", 599u16);

                tracing::error!(
                    "Error relaying to service {} ({} {}): {}",
                    service_id,
                    method_for_error_log,
                    uri_for_error_log,
                    e
                );

                Err(BackendClientError::ConnectionError(format!(
                    "Request to {method_for_error_log} {uri_for_error_log} failed: {e}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HashMap<String, ServiceConfig> {
        [(
            "orders".to_string(),
            ServiceConfig {
                url: "http://orders-svc:3001/".to_string(),
            },
        )]
        .into_iter()
        .collect()
    }

    #[tokio::test]
    async fn test_backend_client_creation() {
        let client = BackendClientAdapter::new(&registry());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_strips_trailing_slash() {
        let client = BackendClientAdapter::new(&registry()).unwrap();

        let uri = client.resolve("orders", "/orders/42?verbose=1").unwrap();

        assert_eq!(uri.to_string(), "http://orders-svc:3001/orders/42?verbose=1");
    }

    #[tokio::test]
    async fn test_unknown_service_is_rejected() {
        let client = BackendClientAdapter::new(&registry()).unwrap();

        let err = client.resolve("billing", "/").unwrap_err();

        assert!(matches!(err, BackendClientError::UnknownService(_)));
    }
}
