//! Request context middleware.
//!
//! Accepts an incoming `x-request-id`, pulls the trace id out of a W3C
//! `traceparent` header when one is present, attaches both to the request's
//! tracing span and echoes them back as response headers.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_TRACE_ID: HeaderName = HeaderName::from_static("x-trace-id");

/// W3C traceparent: `00-<trace_id>-<span_id>-<flags>`.
fn extract_trace_id(traceparent: &str) -> Option<String> {
    let parts: Vec<&str> = traceparent.split('-').collect();
    if parts.len() >= 4 && parts[1].len() == 32 {
        return Some(parts[1].to_string());
    }
    None
}

pub async fn request_context(request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get("traceparent")
        .and_then(|value| value.to_str().ok())
        .and_then(extract_trace_id)
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        %trace_id,
        %request_id,
    );

    let mut response = next.run(request).instrument(span).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        headers.insert(X_TRACE_ID, value);
    }
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(X_REQUEST_ID, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_trace_id_from_valid_traceparent() {
        let traceparent = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

        let trace_id = extract_trace_id(traceparent);

        assert_eq!(
            trace_id.as_deref(),
            Some("0af7651916cd43dd8448eb211c80319c")
        );
    }

    #[test]
    fn test_extract_trace_id_rejects_malformed_headers() {
        assert!(extract_trace_id("not-a-traceparent").is_none());
        assert!(extract_trace_id("00-short-b7ad6b7169203331-01").is_none());
        assert!(extract_trace_id("").is_none());
    }
}
