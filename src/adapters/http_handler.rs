//! Axum-facing handler driving the stage pipeline for every request.
//!
//! Responsibilities:
//! * Builds one `ExchangeContext` per request, keyed by the middleware id
//! * Runs the fixed stage order: CORS, route resolution, forwarding tail
//! * Merges any seeded response headers left in the context into direct
//!   responses so short-circuited paths still carry the gateway decisions
use std::sync::Arc;

use axum::body::Body as AxumBody;
use hyper::{Request, Response};

use crate::{
    adapters::middleware::RequestId,
    config::models::GatewayConfig,
    core::{
        CorsPolicy, ExchangeContext, ForwardingFilter, StageOutcome,
        pipeline::{cors_stage, routing_stage},
    },
};

/// Request handler wiring the stages over shared immutable state.
pub struct PipelineHandler {
    config: Arc<GatewayConfig>,
    cors: Arc<CorsPolicy>,
    forwarding: Arc<ForwardingFilter>,
}

impl PipelineHandler {
    pub fn new(
        config: Arc<GatewayConfig>,
        cors: Arc<CorsPolicy>,
        forwarding: Arc<ForwardingFilter>,
    ) -> Self {
        Self {
            config,
            cors,
            forwarding,
        }
    }

    /// Run the full pipeline and always produce a finalized response.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut ctx = ExchangeContext::new(&request_id);

        if let StageOutcome::ShortCircuit(response) = cors_stage(&self.cors, &req, &mut ctx) {
            return response;
        }

        routing_stage(&self.config, &req, &mut ctx);

        let mut response = self.forwarding.execute(req, &mut ctx).await;

        // Relayed responses already consumed the seeded set during
        // reconciliation; anything left belongs on direct responses. Names
        // the response already carries are kept as-is.
        let headers = response.headers_mut();
        for (name, value) in ctx.response_headers.iter() {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }

        response
    }
}

impl Clone for PipelineHandler {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            cors: self.cors.clone(),
            forwarding: self.forwarding.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use hyper::{HeaderMap, Method, StatusCode, header};

    use super::*;
    use crate::ports::backend_client::{BackendClient, BackendClientResult};

    struct StubClient;

    #[async_trait]
    impl BackendClient for StubClient {
        async fn send(
            &self,
            _request_id: &str,
            _method: Method,
            service_id: &str,
            path: &str,
            _headers: HeaderMap,
            _body: AxumBody,
        ) -> BackendClientResult<Response<AxumBody>> {
            let response = Response::builder()
                .status(StatusCode::OK)
                .header("X-Backend", service_id.to_string())
                .body(AxumBody::from(format!("served {path}")))
                .unwrap();
            Ok(response)
        }
    }

    fn create_test_handler() -> PipelineHandler {
        let config = Arc::new(
            GatewayConfig::builder()
                .listen_addr("127.0.0.1:8080")
                .route("/api", "orders")
                .service("orders", "http://orders:3001")
                .build()
                .unwrap(),
        );
        let cors = Arc::new(CorsPolicy::from_settings(&config.cors).unwrap());
        let forwarding = Arc::new(ForwardingFilter::new(Arc::new(StubClient)));

        PipelineHandler::new(config, cors, forwarding)
    }

    fn get(uri: &str) -> Request<AxumBody> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(AxumBody::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_before_routing() {
        let handler = create_test_handler();

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/no/route/needed")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
            .body(AxumBody::empty())
            .unwrap();

        let response = handler.handle_request(preflight).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS)
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_relayed_request_reaches_backend() {
        let handler = create_test_handler();

        let response = handler.handle_request(get("/api/orders/7")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-Backend").unwrap(), "orders");
        // Seeded CORS decisions survive reconciliation onto the relay
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"served /orders/7");
    }

    #[tokio::test]
    async fn test_unknown_route_gets_404_with_cors_headers() {
        let handler = create_test_handler();

        let response = handler.handle_request(get("/missing")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        // Direct responses still carry the seeded gateway decisions
        assert!(
            response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["code"], 404);
        assert!(parsed["message"].as_str().unwrap().contains("/missing"));
    }
}
