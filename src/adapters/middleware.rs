//! Axum middleware attached ahead of the pipeline handler.
//!
//! Only one layer is needed here: request id assignment. The id is minted
//! before any stage runs, stored in the request extensions for the handler
//! to pick up, and echoed back to the client via `X-Request-ID`.
use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Request id minted by [`request_id_middleware`], readable from extensions.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Generate a per-request UUID, expose it via tracing, request extensions
/// and the `X-Request-ID` response header.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    let span = tracing::info_span!("request", request_id = %request_id);
    let _enter = span.enter();

    req.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-ID", header_value);
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::StatusCode,
        middleware,
        routing::get,
    };
    use tower::ServiceExt; // for oneshot

    use super::*;

    #[tokio::test]
    async fn test_request_id_middleware() {
        let app = Router::new()
            .route(
                "/",
                get(|req: Request| async move {
                    // The id must already be in the extensions by the time
                    // the inner service runs.
                    assert!(req.extensions().get::<RequestId>().is_some());
                    axum::response::Response::builder()
                        .status(StatusCode::OK)
                        .body(Body::empty())
                        .unwrap()
                }),
            )
            .layer(middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let headers = response.headers();

        assert!(headers.contains_key("X-Request-ID"));

        // Verify it's a valid UUID
        let request_id = headers.get("X-Request-ID").unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(request_id).is_ok());
    }
}
