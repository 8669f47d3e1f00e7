// Error logging for responses built from AppError

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{error, warn};

use crate::error::ErrorReport;

use super::rate_limit::client_ip;

/// Log failed requests: 5xx at `error` with the captured backtrace, 4xx at
/// `warn` without one. Client-facing bodies are never touched.
pub async fn log_errors(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_ip(&request);

    let response = next.run(request).await;
    let status = response.status();

    match response.extensions().get::<ErrorReport>() {
        Some(report) if status.is_server_error() => error!(
            %method,
            %path,
            %client,
            status = status.as_u16(),
            code = report.code,
            detail = %report.detail,
            backtrace = report.backtrace.as_deref().unwrap_or_default(),
            "request failed"
        ),
        Some(report) => warn!(
            %method,
            %path,
            %client,
            status = status.as_u16(),
            code = report.code,
            detail = %report.detail,
            "request rejected"
        ),
        None if status.is_server_error() => {
            error!(%method, %path, %client, status = status.as_u16(), "request failed")
        }
        None => {}
    }

    response
}
