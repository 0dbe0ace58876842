// Connection handling module
// Accepts a single TCP connection and serves it with the dispatcher

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept a connection, enforcing the connection limit.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state));
}

/// Serve one connection in a spawned task.
///
/// The connection is bounded by `performance.read_timeout`; the active
/// connection counter is released when the task ends.
fn handle_connection(stream: tokio::net::TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let timeout_duration =
            std::time::Duration::from_secs(state.config.performance.read_timeout);

        let mut builder = http1::Builder::new();
        builder.keep_alive(state.config.performance.keep_alive);

        let service_state = Arc::clone(&state);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                handler::handle_request(req, Arc::clone(&service_state), peer_addr)
            }),
        );

        match tokio::time::timeout(timeout_duration, conn).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}
