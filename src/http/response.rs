//! HTTP response building module
//!
//! Every response body is JSON: handler replies, structured
//! `{retcode, message}` results and the server's own error statuses.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response, StatusCode};

const JSON: &str = "application/json";

/// Build a JSON response from a serialised body
pub fn build_json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let bytes = Bytes::from(body.to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", JSON)
        .header("Content-Length", bytes.len())
        .body(Full::new(bytes))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

fn error_body(status: StatusCode) -> serde_json::Value {
    serde_json::json!({
        "error": status.canonical_reason().unwrap_or("Error"),
        "status": status.as_u16(),
    })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_json_response(StatusCode::NOT_FOUND, &error_body(StatusCode::NOT_FOUND))
}

/// Build 405 Method Not Allowed response listing the methods the path takes
pub fn build_405_response(allowed: &[Method]) -> Response<Full<Bytes>> {
    let allow = allowed
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let mut response = build_json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &error_body(StatusCode::METHOD_NOT_ALLOWED),
    );
    match allow.parse() {
        Ok(value) => {
            response.headers_mut().insert("Allow", value);
        }
        Err(e) => crate::logger::log_error(&format!("Invalid Allow header {allow:?}: {e}")),
    }
    response
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_json_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &error_body(StatusCode::PAYLOAD_TOO_LARGE),
    )
}

/// Build 400 Bad Request response for bodies that could not be read
pub fn build_400_response() -> Response<Full<Bytes>> {
    build_json_response(StatusCode::BAD_REQUEST, &error_body(StatusCode::BAD_REQUEST))
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    build_json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &error_body(StatusCode::INTERNAL_SERVER_ERROR),
    )
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
