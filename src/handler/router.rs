//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route resolution, body size
//! checks, body collection and handing the request to its binder.

use crate::config::AppState;
use crate::http::{self, BodyError, IncomingRequest};
use crate::logger::{self, AccessLogEntry};
use crate::routing::Resolution;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, SERVER};
use hyper::{Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let mut response = route_request(req, &state, &mut entry).await;
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server);
    }

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.request_time_us =
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

async fn route_request<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    // 1. Resolve the route
    let (binder, params) = match state.router.resolve(req.method(), req.uri().path()) {
        Resolution::Found { binder, params } => (binder, params),
        Resolution::MethodNotAllowed(allowed) => {
            logger::log_warning(&format!(
                "Method not allowed: {} {}",
                req.method(),
                req.uri().path()
            ));
            return http::build_405_response(&allowed);
        }
        Resolution::NotFound => return http::build_404_response(),
    };
    entry.handler = Some(binder.descriptor().name.clone());

    // 2. Check body size before reading anything
    let max_body_size = state.max_body_size();
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return resp;
    }

    // 3. Collect the body
    let mut incoming = match IncomingRequest::from_hyper(req, max_body_size).await {
        Ok(incoming) => incoming,
        Err(BodyError::TooLarge(limit)) => {
            logger::log_error(&format!("Request body too large (max: {limit})"));
            return http::build_413_response();
        }
        Err(e) => {
            logger::log_warning(&e.to_string());
            return http::build_400_response();
        }
    };
    incoming.set_match_info(params);
    let incoming = Arc::new(incoming);

    // 4. Bind and call
    match binder.dispatch(Arc::clone(&incoming)).await {
        Ok(reply) => {
            entry.retcode = reply.get("retcode").and_then(serde_json::Value::as_i64);
            http::build_json_response(StatusCode::OK, &reply)
        }
        Err(e) => {
            logger::log_handler_fault(incoming.path(), &e);
            http::build_500_response()
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: usize) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<usize>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}
