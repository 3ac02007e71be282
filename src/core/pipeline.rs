//! Linear stage sequencing executed over one mutable `ExchangeContext`.
//!
//! Stages are plain functions run in a fixed order by the handler: CORS,
//! then route resolution, then the forwarding tail. Each stage records its
//! `FilterResult` into the context for the next stage to inspect.
use axum::body::Body as AxumBody;
use hyper::{Request, StatusCode};

use crate::{
    config::models::{GatewayConfig, RouteConfig},
    core::{
        context::{ExchangeContext, FilterResult, StageOutcome},
        cors::CorsPolicy,
    },
};

/// Stage id recorded by the CORS stage
pub const CORS_STAGE: &str = "cors";
/// Stage id recorded by the route resolution stage
pub const ROUTING_STAGE: &str = "routing";
/// Stage id recorded by the forwarding tail
pub const FORWARDING_STAGE: &str = "forwarding";

/// CORS stage, first on every path.
///
/// Preflights short-circuit with a decorated empty 200. Everything else
/// gets the actual-response headers seeded into the context.
pub fn cors_stage(
    policy: &CorsPolicy,
    req: &Request<AxumBody>,
    ctx: &mut ExchangeContext,
) -> StageOutcome {
    if CorsPolicy::is_preflight(req) {
        tracing::debug!(request.id = %ctx.request_id, "Preflight short-circuit");
        return StageOutcome::ShortCircuit(policy.preflight_response());
    }

    policy.seed_response_headers(&mut ctx.response_headers);
    ctx.prior_result = FilterResult::success(CORS_STAGE);
    StageOutcome::Continue
}

/// Route resolution stage, longest prefix match against the route table.
///
/// A match populates the service id, the prefix-stripped relative path
/// (query preserved) and the per-route header overrides. No match binds a
/// 404 direct response and fails the result for the forwarding tail to
/// pass through.
pub fn routing_stage(
    config: &GatewayConfig,
    req: &Request<AxumBody>,
    ctx: &mut ExchangeContext,
) -> StageOutcome {
    let path = req.uri().path();

    let Some((prefix, route)) = find_matching_route(config, path) else {
        tracing::info!(request.id = %ctx.request_id, "No route matches {}", path);
        ctx.bind_json_direct_response(
            ROUTING_STAGE,
            StatusCode::NOT_FOUND,
            &format!("no route for {path}"),
            None,
        );
        return StageOutcome::Continue;
    };

    ctx.service_id = Some(route.service.clone());
    ctx.relative_path = Some(relative_path(path, &prefix, req.uri().query()));
    if !route.append_headers.is_empty() {
        ctx.header_overrides = Some(route.append_headers.clone());
    }
    ctx.prior_result = FilterResult::success(ROUTING_STAGE);
    StageOutcome::Continue
}

/// Longest-prefix match to find a route entry for an incoming path.
fn find_matching_route<'a>(
    config: &'a GatewayConfig,
    path: &str,
) -> Option<(String, &'a RouteConfig)> {
    config
        .routes
        .iter()
        .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(prefix, route)| (prefix.clone(), route))
}

/// Strip the matched prefix, keep the query, always return a rooted path.
fn relative_path(path: &str, prefix: &str, query: Option<&str>) -> String {
    let stripped = path.strip_prefix(prefix).unwrap_or(path);
    let mut relative = if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    };
    if let Some(q) = query {
        relative.push('?');
        relative.push_str(q);
    }
    relative
}

#[cfg(test)]
mod tests {
    use hyper::{Method, header};

    use super::*;
    use crate::config::models::GatewayConfig;

    fn test_config() -> GatewayConfig {
        GatewayConfig::builder()
            .listen_addr("127.0.0.1:8080")
            .route("/api", "api-v1")
            .route("/api/v2", "api-v2")
            .route_with_headers(
                "/internal",
                "internal",
                [("X-Channel".to_string(), "gateway".to_string())]
                    .into_iter()
                    .collect(),
            )
            .service("api-v1", "http://api-v1:3001")
            .service("api-v2", "http://api-v2:3002")
            .service("internal", "http://internal:3003")
            .build()
            .unwrap()
    }

    fn get(uri: &str) -> Request<AxumBody> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(AxumBody::empty())
            .unwrap()
    }

    #[test]
    fn test_routing_longest_prefix_wins() {
        let config = test_config();
        let mut ctx = ExchangeContext::new("rid");

        let outcome = routing_stage(&config, &get("/api/v2/users"), &mut ctx);

        assert!(matches!(outcome, StageOutcome::Continue));
        assert!(ctx.prior_result.success);
        assert_eq!(ctx.service_id.as_deref(), Some("api-v2"));
        assert_eq!(ctx.relative_path.as_deref(), Some("/users"));
    }

    #[test]
    fn test_routing_preserves_query() {
        let config = test_config();
        let mut ctx = ExchangeContext::new("rid");

        routing_stage(&config, &get("/api/users?page=2&size=10"), &mut ctx);

        assert_eq!(ctx.service_id.as_deref(), Some("api-v1"));
        assert_eq!(ctx.relative_path.as_deref(), Some("/users?page=2&size=10"));
    }

    #[test]
    fn test_routing_exact_prefix_maps_to_root() {
        let config = test_config();
        let mut ctx = ExchangeContext::new("rid");

        routing_stage(&config, &get("/api"), &mut ctx);

        assert_eq!(ctx.relative_path.as_deref(), Some("/"));
    }

    #[test]
    fn test_routing_sets_per_route_overrides() {
        let config = test_config();
        let mut ctx = ExchangeContext::new("rid");

        routing_stage(&config, &get("/internal/jobs"), &mut ctx);

        let overrides = ctx.header_overrides.unwrap();
        assert_eq!(overrides["X-Channel"], "gateway");
    }

    #[test]
    fn test_routing_unknown_path_binds_404() {
        let config = test_config();
        let mut ctx = ExchangeContext::new("rid");

        let outcome = routing_stage(&config, &get("/unknown"), &mut ctx);

        assert!(matches!(outcome, StageOutcome::Continue));
        assert!(!ctx.prior_result.success);
        assert_eq!(ctx.prior_result.stage, ROUTING_STAGE);
        let response = ctx.direct_response.as_ref().unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cors_stage_short_circuits_preflight() {
        let policy = CorsPolicy::from_settings(&Default::default()).unwrap();
        let mut ctx = ExchangeContext::new("rid");

        let preflight = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/users")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(AxumBody::empty())
            .unwrap();

        match cors_stage(&policy, &preflight, &mut ctx) {
            StageOutcome::ShortCircuit(response) => {
                assert_eq!(response.status(), StatusCode::OK);
                assert!(
                    response
                        .headers()
                        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS)
                );
            }
            StageOutcome::Continue => panic!("preflight must short-circuit"),
        }
    }

    #[test]
    fn test_cors_stage_seeds_actual_response_headers() {
        let policy = CorsPolicy::from_settings(&Default::default()).unwrap();
        let mut ctx = ExchangeContext::new("rid");

        let outcome = cors_stage(&policy, &get("/api/users"), &mut ctx);

        assert!(matches!(outcome, StageOutcome::Continue));
        assert!(ctx.prior_result.success);
        assert_eq!(ctx.prior_result.stage, CORS_STAGE);
        assert!(
            ctx.response_headers
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }
}
