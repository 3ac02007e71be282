//! Terminal forwarding stage relaying requests to the resolved backend.
//!
//! The filter inspects the prior stage result first: a failure with a bound
//! direct response is passed through unchanged, a failure without one is
//! logged and answered with a synthesized 500. Successful pipelines are
//! relayed through the `BackendClient` port with streaming bodies in both
//! directions.
//!
//! The backend body is wrapped in a `RelayBody` guard. Dropping the guard
//! before the stream finished (client cancellation or a relay error) spawns
//! an asynchronous drain of the remainder so the pooled backend connection
//! is released. Normal completion marks the guard done and the drop is a
//! no-op.
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context as TaskContext, Poll},
};

use axum::body::Body as AxumBody;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;
use hyper::{Request, Response, StatusCode, header};

use crate::{
    core::{
        context::{ExchangeContext, json_error_body},
        headers,
        pipeline::FORWARDING_STAGE,
    },
    ports::backend_client::{BackendClient, BackendClientError},
};

/// Streaming response body with drain-on-drop cleanup.
///
/// Polls the wrapped backend body through unchanged. The `done` flag is set
/// only when the stream reports its natural end; a drop before that point
/// hands the remainder to a fire-and-forget drain task. Taking the inner
/// body out makes the drain run at most once.
pub struct RelayBody {
    inner: Option<AxumBody>,
    done: bool,
}

impl RelayBody {
    pub fn new(inner: AxumBody) -> Self {
        Self {
            inner: Some(inner),
            done: false,
        }
    }
}

impl HttpBody for RelayBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(inner).poll_frame(cx) {
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Some(inner) => self.done || inner.is_end_stream(),
            None => true,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Some(inner) => inner.size_hint(),
            None => SizeHint::with_exact(0),
        }
    }
}

impl Drop for RelayBody {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let Some(body) = self.inner.take() else {
            return;
        };

        // Unconsumed backend body: drain it off-task so the pooled
        // connection is released. No runtime means nothing to drain into.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = body.collect().await;
            });
        }
    }
}

/// Forwarding tail of the pipeline.
pub struct ForwardingFilter {
    client: Arc<dyn BackendClient>,
}

impl ForwardingFilter {
    pub fn new(client: Arc<dyn BackendClient>) -> Self {
        Self { client }
    }

    /// Run the tail stage and always produce a finalized response.
    ///
    /// Terminal outcomes: the relayed backend response, a passed-through
    /// direct response from an earlier failed stage, or a synthesized JSON
    /// failure. Never panics or propagates past this boundary.
    pub async fn execute(
        &self,
        req: Request<AxumBody>,
        ctx: &mut ExchangeContext,
    ) -> Response<AxumBody> {
        if !ctx.prior_result.success {
            if let Some(response) = ctx.direct_response.take() {
                return response;
            }

            match ctx.prior_result.cause.as_ref() {
                Some(cause) => tracing::error!(
                    request.id = %ctx.request_id,
                    stage = %ctx.prior_result.stage,
                    "Stage failed: {:#}",
                    cause
                ),
                None => tracing::error!(
                    request.id = %ctx.request_id,
                    stage = %ctx.prior_result.stage,
                    "Stage failed without a bound response or cause"
                ),
            }

            return synthesize_error(
                &ctx.request_id,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("stage '{}' failed", ctx.prior_result.stage),
            );
        }

        match self.forward(req, ctx).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(request.id = %ctx.request_id, "Backend relay failed: {}", e);
                ctx.prior_result =
                    crate::core::context::FilterResult::failure(FORWARDING_STAGE, e.into());
                synthesize_error(&ctx.request_id, StatusCode::BAD_GATEWAY, "backend unavailable")
            }
        }
    }

    async fn forward(
        &self,
        req: Request<AxumBody>,
        ctx: &mut ExchangeContext,
    ) -> Result<Response<AxumBody>, BackendClientError> {
        let service_id = ctx
            .service_id
            .clone()
            .ok_or_else(|| BackendClientError::InvalidRequest("no service resolved".to_string()))?;
        let relative_path = ctx.relative_path.clone().unwrap_or_else(|| "/".to_string());

        let method = req.method().clone();
        let (parts, body) = req.into_parts();

        // Inbound headers verbatim, then the per-route overrides on top
        let mut outgoing = parts.headers;
        if let Some(overrides) = ctx.header_overrides.as_ref() {
            headers::apply_overrides(&mut outgoing, overrides);
        }

        let backend_response = self
            .client
            .send(
                &ctx.request_id,
                method,
                &service_id,
                &relative_path,
                outgoing,
                body,
            )
            .await?;

        let (mut parts, backend_body) = backend_response.into_parts();

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                request.id = %ctx.request_id,
                status = %parts.status,
                headers = ?parts.headers,
                "Backend response summary"
            );
        }

        // Merge backend headers onto the seeded client-facing set
        let mut client_headers = std::mem::take(&mut ctx.response_headers);
        headers::reconcile_response(&mut client_headers, &parts.headers);
        parts.headers = client_headers;

        let relay = AxumBody::new(RelayBody::new(backend_body));
        Ok(Response::from_parts(parts, relay))
    }
}

/// Finalized JSON failure response in the shared error body shape.
fn synthesize_error(request_id: &str, status: StatusCode, message: &str) -> Response<AxumBody> {
    let body = json_error_body(status.as_u16(), message, request_id);
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(AxumBody::from(body))
        .unwrap_or_else(|_| Response::new(AxumBody::empty()))
}
