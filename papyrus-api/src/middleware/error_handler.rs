use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{error, warn};

/// Logs every failed request. Numbered failure codes outside the 4xx/5xx
/// ranges (3xx extraction, 6xx/7xx) are logged like client errors.
pub async fn handle_errors(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let path = req.uri().path().to_string();
    let method = req.method().to_string();

    let response = next.run(req).await;

    let elapsed = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        error!(
            "Server error: {} {} - Status: {} - Duration: {:?}",
            method, path, status, elapsed
        );
    } else if status.as_u16() >= 300 {
        warn!(
            "Request failed: {} {} - Status: {} - Duration: {:?}",
            method,
            path,
            status.as_u16(),
            elapsed
        );
    }

    response
}
