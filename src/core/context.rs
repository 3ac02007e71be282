//! Per-request exchange state threaded through the pipeline stages.
//!
//! One `ExchangeContext` exists per inbound request and is exclusively owned
//! by that request's task. Stages communicate through it: each records a
//! `FilterResult` for the next stage to inspect, and a failing stage may bind
//! a direct response that the forwarding tail passes through unchanged.
use std::collections::HashMap;

use axum::body::Body as AxumBody;
use hyper::{HeaderMap, Response, StatusCode, header};

/// Outcome recorded by a pipeline stage for the next stage to inspect.
///
/// Invariant: when `success` is false, either a direct response is bound in
/// the owning `ExchangeContext` or `cause` carries the failure. Both absent
/// is an internal consistency violation surfaced by the forwarding tail.
#[derive(Debug)]
pub struct FilterResult {
    /// Id of the stage that produced this result
    pub stage: String,
    pub success: bool,
    /// Failure cause, present when the stage did not bind a direct response
    pub cause: Option<eyre::Report>,
}

impl FilterResult {
    /// Successful result for the given stage
    pub fn success(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            success: true,
            cause: None,
        }
    }

    /// Failed result with an inspectable cause
    pub fn failure(stage: impl Into<String>, cause: eyre::Report) -> Self {
        Self {
            stage: stage.into(),
            success: false,
            cause: Some(cause),
        }
    }

    /// Failed result whose explanation lives in the bound direct response
    pub fn failure_with_response(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            success: false,
            cause: None,
        }
    }
}

/// Control-flow decision returned by each stage.
pub enum StageOutcome {
    /// Proceed to the next stage
    Continue,
    /// Stop the pipeline and return this response to the client
    ShortCircuit(Response<AxumBody>),
}

/// Mutable per-request state owned by a single request task.
pub struct ExchangeContext {
    /// Correlation id echoed in logs and error bodies
    pub request_id: String,
    /// Outgoing request header overrides, keyed case-insensitively
    pub header_overrides: Option<HashMap<String, String>>,
    /// Target service resolved by the routing stage
    pub service_id: Option<String>,
    /// Path and query relative to the service base URL
    pub relative_path: Option<String>,
    /// Response bound by an earlier stage, returned without forwarding
    pub direct_response: Option<Response<AxumBody>>,
    /// Client-facing headers seeded by the CORS stage, the base set the
    /// response reconciler merges backend headers into
    pub response_headers: HeaderMap,
    /// Result recorded by the most recent stage
    pub prior_result: FilterResult,
}

impl ExchangeContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            header_overrides: None,
            service_id: None,
            relative_path: None,
            direct_response: None,
            response_headers: HeaderMap::new(),
            prior_result: FilterResult::success("ingress"),
        }
    }

    /// Build a JSON response, bind it as the direct response and mark the
    /// prior result as a failure for `stage`.
    ///
    /// Optional header overrides are applied to the response; unparsable
    /// pairs are skipped with a warning.
    pub fn bind_json_direct_response(
        &mut self,
        stage: &str,
        status: StatusCode,
        message: &str,
        header_overrides: Option<&HashMap<String, String>>,
    ) {
        let body = json_error_body(status.as_u16(), message, &self.request_id);

        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(overrides) = header_overrides {
            for (name, value) in overrides {
                if let (Ok(header_name), Ok(header_value)) = (
                    name.parse::<header::HeaderName>(),
                    header::HeaderValue::from_str(value),
                ) {
                    builder = builder.header(header_name, header_value);
                } else {
                    tracing::warn!(
                        request.id = %self.request_id,
                        "Invalid direct response header: {} = {}",
                        name,
                        value
                    );
                }
            }
        }

        // Builder only fails on invalid parts, all constructed above
        let response = builder
            .body(AxumBody::from(body))
            .unwrap_or_else(|_| Response::new(AxumBody::empty()));

        self.direct_response = Some(response);
        self.prior_result = FilterResult::failure_with_response(stage);
    }
}

/// Render the error body shape shared by every synthesized failure response.
pub fn json_error_body(code: u16, message: &str, request_id: &str) -> String {
    serde_json::json!({
        "code": code,
        "message": message,
        "requestId": request_id,
    })
    .to_string()
}
