//! Routing module
//!
//! Provides the route table the server dispatches through:
//! - Path patterns with `{name}` placeholders
//! - Endpoint declarations (method + path + signature + handler)
//! - Ordered resolution with 404/405 distinction

mod matcher;
mod router;

pub use matcher::PathPattern;
pub use router::{Endpoint, Resolution, RouteEntry, Router};
