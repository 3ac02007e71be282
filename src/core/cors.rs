//! Gateway-wide CORS policy, constructed once at startup.
//!
//! The policy applies to every path and is evaluated before any other
//! stage. Preflight requests short-circuit with a decorated empty response,
//! all other requests get the actual-response headers seeded into the
//! exchange context so the response reconciler treats them as the gateway's
//! decision.
use axum::body::Body as AxumBody;
use eyre::{Result, WrapErr};
use hyper::{HeaderMap, Method, Request, Response, StatusCode, header, header::HeaderValue};

use crate::config::models::CorsSettings;

/// Methods accepted for cross-origin requests
const ALLOWED_METHODS: &str = "OPTIONS, GET, POST, HEAD, PUT, DELETE";

/// Every request header is allowed
const ALLOWED_HEADERS: &str = "*";

/// Immutable CORS decision set shared by every request.
///
/// The configured origin and credentials flag are emitted exactly as
/// configured, including the wildcard-origin-with-credentials pairing.
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    allow_credentials: bool,
    expose_headers: Option<HeaderValue>,
    max_age: HeaderValue,
}

impl CorsPolicy {
    /// Build the policy from configuration values.
    pub fn from_settings(settings: &CorsSettings) -> Result<Self> {
        let allow_origin = HeaderValue::from_str(&settings.allow_origin)
            .wrap_err("Invalid cors.allow_origin value")?;

        let expose_headers = if settings.log_headers.is_empty() {
            None
        } else {
            Some(
                HeaderValue::from_str(&settings.log_headers.join(", "))
                    .wrap_err("Invalid cors.log_headers value")?,
            )
        };

        let max_age = HeaderValue::from_str(&settings.max_age_secs.to_string())
            .wrap_err("Invalid cors.max_age_secs value")?;

        // Browsers reject this pairing; it is still emitted as configured
        if settings.allow_origin == "*" && settings.allow_credentials {
            tracing::warn!(
                "CORS configured with wildcard allow_origin and allow_credentials=true"
            );
        }

        Ok(Self {
            allow_origin,
            allow_credentials: settings.allow_credentials,
            expose_headers,
            max_age,
        })
    }

    /// A preflight is OPTIONS with both an Origin and a requested method.
    pub fn is_preflight(req: &Request<AxumBody>) -> bool {
        req.method() == Method::OPTIONS
            && req.headers().contains_key(header::ORIGIN)
            && req
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// Empty 200 carrying the full preflight decision set.
    pub fn preflight_response(&self) -> Response<AxumBody> {
        let mut response = Response::new(AxumBody::empty());
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin.clone(),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());

        response
    }

    /// Seed the actual-response decision headers into the client-facing set.
    pub fn seed_response_headers(&self, headers: &mut HeaderMap) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            self.allow_origin.clone(),
        );
        if self.allow_credentials {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
        if let Some(expose) = &self.expose_headers {
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_with_log_headers() -> CorsPolicy {
        let settings = CorsSettings {
            log_headers: vec!["X-Trace-Id".to_string(), "X-Span-Id".to_string()],
            ..CorsSettings::default()
        };
        CorsPolicy::from_settings(&settings).unwrap()
    }

    fn preflight_request() -> Request<AxumBody> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/orders")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(AxumBody::empty())
            .unwrap()
    }

    #[test]
    fn test_preflight_detection() {
        assert!(CorsPolicy::is_preflight(&preflight_request()));

        // OPTIONS without the requested-method header is not a preflight
        let plain_options = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/orders")
            .header(header::ORIGIN, "https://app.example.com")
            .body(AxumBody::empty())
            .unwrap();
        assert!(!CorsPolicy::is_preflight(&plain_options));

        let get = Request::builder()
            .method(Method::GET)
            .uri("/api/orders")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(AxumBody::empty())
            .unwrap();
        assert!(!CorsPolicy::is_preflight(&get));
    }

    #[test]
    fn test_preflight_response_decision_set() {
        let policy = policy_with_log_headers();
        let response = policy.preflight_response();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "OPTIONS, GET, POST, HEAD, PUT, DELETE"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "*"
        );
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
        assert_eq!(headers.get(header::ACCESS_CONTROL_MAX_AGE).unwrap(), "3600");
    }

    #[test]
    fn test_seeded_actual_response_headers() {
        let policy = policy_with_log_headers();
        let mut headers = HeaderMap::new();

        policy.seed_response_headers(&mut headers);

        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_EXPOSE_HEADERS).unwrap(),
            "X-Trace-Id, X-Span-Id"
        );
        // Preflight-only names are not seeded on actual responses
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        assert!(!headers.contains_key(header::ACCESS_CONTROL_MAX_AGE));
    }

    #[test]
    fn test_no_expose_headers_without_log_headers() {
        let policy = CorsPolicy::from_settings(&CorsSettings::default()).unwrap();
        let mut headers = HeaderMap::new();

        policy.seed_response_headers(&mut headers);

        assert!(!headers.contains_key(header::ACCESS_CONTROL_EXPOSE_HEADERS));
    }
}
