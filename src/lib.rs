//! routebind
//!
//! Declarative request binding for JSON APIs on hyper. A handler declares its
//! parameters once with a [`Signature`]; each request's JSON body, form
//! fields, query string and path parameters are then bound to those names
//! and passed to the handler as [`BoundArgs`].
//!
//! ```no_run
//! use routebind::{BoundArgs, Endpoint, HandlerError, Reply, Router, Signature};
//!
//! async fn greet(args: BoundArgs) -> Result<Reply, HandlerError> {
//!     let name: String = args.require("name")?;
//!     Ok(serde_json::json!({ "greeting": format!("hello {name}") }))
//! }
//!
//! let mut router = Router::new();
//! router
//!     .register(Endpoint::post("/greet", Signature::new("greet").keyword("name"), greet))
//!     .expect("valid route");
//! ```

pub mod binding;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod routing;
pub mod server;

pub use binding::{
    BoundArgs, Handler, HandlerDescriptor, ParamKind, Reply, RequestBinder, Signature,
};
pub use error::{ApiError, ConfigError, HandlerError};
pub use http::IncomingRequest;
pub use routing::{Endpoint, Router};
