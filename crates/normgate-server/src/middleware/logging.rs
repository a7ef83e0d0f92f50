//! Request logging middleware.
//!
//! Logs one line per request with client IP, the authenticated user when
//! known, the outcome status and the elapsed milliseconds. Severity scales
//! with the response class.

use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, info, warn};

/// Log request/response pairs with timing.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .unwrap_or("unknown")
        .trim()
        .to_string();

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();

    if status >= 500 {
        error!(%method, %path, status, elapsed_ms, client_ip = %client_ip, "request failed");
    } else if status >= 400 {
        warn!(%method, %path, status, elapsed_ms, client_ip = %client_ip, "request rejected");
    } else {
        info!(%method, %path, status, elapsed_ms, client_ip = %client_ip, "request completed");
    }

    response
}
