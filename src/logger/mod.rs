//! Logger module
//!
//! Provides logging utilities for the dispatch layer including:
//! - Subscriber setup (level filter, plain or JSON lines, file targets)
//! - Route registration and dispatch logging
//! - Access logging with multiple formats
//! - Error and warning logging

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use std::net::SocketAddr;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::{filter_fn, EnvFilter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer, Registry};

use crate::binding::BoundArgs;
use crate::config::{Config, LoggingConfig};
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("cannot open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid log level {0:?}")]
    Level(String),

    #[error("logger already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// Initialize the global subscriber with configuration
///
/// Should be called once at application startup. Info and debug lines go to
/// the access target, warnings and errors to the error target.
pub fn init(config: &LoggingConfig) -> Result<(), LoggerError> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|_| LoggerError::Level(config.level.clone()))?;

    let json = config.format.eq_ignore_ascii_case("json");
    let access = writer::make_writer(config.access_log_file.as_deref(), writer::Stream::Stdout)?;
    let errors = writer::make_writer(config.error_log_file.as_deref(), writer::Stream::Stderr)?;

    let layers: Vec<BoxedLayer> = vec![
        stream_layer(access, json)
            .with_filter(filter_fn(|meta| *meta.level() > Level::WARN))
            .boxed(),
        stream_layer(errors, json)
            .with_filter(filter_fn(|meta| *meta.level() <= Level::WARN))
            .boxed(),
    ];

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()?;
    Ok(())
}

fn stream_layer(target: writer::LogTarget, json: bool) -> BoxedLayer {
    let ansi = target.is_terminal();
    let layer = fmt::layer().with_target(false).with_ansi(ansi);
    if json {
        layer.json().with_writer(target.into_make_writer()).boxed()
    } else {
        layer.with_writer(target.into_make_writer()).boxed()
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, routes: usize) {
    tracing::info!("======================================");
    tracing::info!("Dispatch server started successfully");
    tracing::info!("Listening on: http://{addr}");
    tracing::info!("Log level: {}", config.logging.level);
    tracing::info!("Registered routes: {routes}");
    if let Some(workers) = config.server.workers {
        tracing::info!("Worker threads: {workers}");
    }
    if let Some(ref path) = config.logging.access_log_file {
        tracing::info!("Access log: {path}");
    }
    if let Some(ref path) = config.logging.error_log_file {
        tracing::info!("Error log: {path}");
    }
    tracing::info!("======================================");
}

pub fn log_route_added(method: &str, path: &str, handler: &str, params: &str) {
    tracing::info!("add route {method}:{path}=>{handler}({params})");
}

pub fn log_route_skipped(handler: &str) {
    tracing::debug!("skip {handler}: no route method or path");
}

pub fn log_dispatch(path: &str, args: &BoundArgs) {
    tracing::info!("calling {path} with arg {args:?}");
}

pub fn log_bind_rejected(path: &str, err: &ApiError) {
    tracing::info!(retcode = err.retcode, "rejected {path}: {}", err.message);
}

pub fn log_duplicate_arg(key: &str) {
    tracing::warn!("duplicate arg {key} in named kw arg kw");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!("[Connection] Accepted from: {peer_addr}");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_handler_fault(path: &str, err: &anyhow::Error) {
    tracing::error!("handler for {path} failed: {err:#}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}
