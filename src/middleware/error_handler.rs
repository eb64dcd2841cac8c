use axum::{
    body::{Body, to_bytes},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::error;

/// Bytes of a 5xx body written to the log. The client always gets the whole body.
const MAX_LOGGED_BODY: usize = 4096;

/// Logs the method, path and body of every 5xx response.
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let logged = &bytes[..bytes.len().min(MAX_LOGGED_BODY)];
    error!(
        %method,
        path = %path,
        status = %parts.status,
        body = %String::from_utf8_lossy(logged),
        truncated = bytes.len() > MAX_LOGGED_BODY,
        "server error"
    );

    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
