use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 请求日志中间件，同时保证请求和响应都带有请求ID
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let request_id = match req.headers().get(REQUEST_ID_HEADER) {
        Some(value) if !value.is_empty() => value.clone(),
        _ => {
            let generated = uuid::Uuid::new_v4().to_string();
            let value = HeaderValue::from_str(&generated)
                .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
            req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
            value
        }
    };

    let user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let start_time = Instant::now();

    tracing::info!(
        "Request started: {} {} - request_id={:?} - User-Agent: {}",
        method,
        uri,
        request_id,
        user_agent
    );

    let mut response = next.run(req).await;

    tracing::info!(
        "Request completed: {} {} - {} - {}ms",
        method,
        uri,
        response.status(),
        start_time.elapsed().as_millis()
    );

    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}
