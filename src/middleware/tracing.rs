//! Request tracing middleware

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Log every request with its route template, status and duration
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    // Route template keeps ids out of the label, e.g. /api/banks/:bank_id/offers
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let start = Instant::now();
    tracing::debug!(method = %method, path = %path, "Request started");

    let response = next.run(request).await;

    let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status = response.status().as_u16();

    if response.status().is_server_error() {
        tracing::error!(
            method = %method,
            route = %route,
            path = %path,
            status,
            duration_ms,
            "Request failed"
        );
    } else if response.status().is_client_error() {
        tracing::warn!(
            method = %method,
            route = %route,
            path = %path,
            status,
            duration_ms,
            "Request rejected"
        );
    } else {
        tracing::info!(
            method = %method,
            route = %route,
            status,
            duration_ms,
            "Request completed"
        );
    }

    response
}
