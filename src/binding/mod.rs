//! Parameter binding
//!
//! - [`Signature`] / [`HandlerDescriptor`]: a handler's declared parameters,
//!   classified once at registration
//! - [`RequestBinder`]: builds [`BoundArgs`] per request and calls the handler

mod args;
mod binder;
mod handler;
mod signature;

pub use args::BoundArgs;
pub use binder::{merge_path_params, parse_query, RequestBinder};
pub use handler::{Handler, HandlerFuture, Reply};
pub use signature::{HandlerDescriptor, Param, ParamKind, Signature, REQUEST_PARAM};
