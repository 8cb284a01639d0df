//! Request logging and request-id generation

use axum::{extract::Request, middleware::Next, response::Response};
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Generates a UUID v4 for every request without an `x-request-id`.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        id.parse().ok().map(RequestId::new)
    }
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
    );

    async move {
        let started = Instant::now();
        let response = next.run(request).await;
        let status = response.status().as_u16();
        let latency_ms = started.elapsed().as_millis() as u64;

        if response.status().is_server_error() {
            error!(status, latency_ms, "request failed");
        } else if response.status().is_client_error() {
            warn!(status, latency_ms, "request rejected");
        } else {
            info!(status, latency_ms, "request completed");
        }

        response
    }
    .instrument(span)
    .await
}

/// Runs a call to an external service inside a span and logs its outcome.
pub async fn log_external_call<F, T, E>(service: &str, operation: &str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let span = tracing::info_span!("external_call", service = %service, operation = %operation);

    async move {
        let started = Instant::now();
        let result = fut.await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => info!(duration_ms, "external call succeeded"),
            Err(e) => warn!(duration_ms, error = %e, "external call failed"),
        }
        result
    }
    .instrument(span)
    .await
}
