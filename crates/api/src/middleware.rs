use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Header carrying the per-request id, echoed back on the response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wrap each request in a span carrying method, path and a request id, and log the
/// response status and latency when it completes.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    if let Ok(value) = request_id.parse() {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let span = info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id,
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(req).await;
        info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        if let Ok(value) = request_id.parse() {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}
