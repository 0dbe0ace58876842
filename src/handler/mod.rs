//! HTTP request handler module
//!
//! Bridges hyper requests to the route table and the parameter binder.

pub mod router;

pub use router::handle_request;
