//! HTTP protocol layer module
//!
//! Request abstraction consumed by the binder, and the JSON response
//! builders used by the dispatcher.

pub mod request;
pub mod response;

// Re-export commonly used types
pub use request::{BodyError, IncomingRequest, PathParams};
pub use response::{
    build_400_response, build_404_response, build_405_response, build_413_response,
    build_500_response, build_json_response,
};
