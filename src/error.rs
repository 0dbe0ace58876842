//! Error types
//!
//! Three families of failure cross this crate:
//! - [`ConfigError`]: a handler or route was declared wrongly. Raised while
//!   registering, never at request time.
//! - [`ApiError`]: a request could not be bound, or a handler rejected it.
//!   Rendered to the client as `{"retcode": .., "message": ..}`.
//! - [`HandlerError`]: what a handler returns when it fails.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A required keyword argument was not supplied by any source
pub const EMISSING_ARGUMENT: i32 = 101;
/// POST body without a `Content-Type` header
pub const EHTTP_NO_CONTENT_TYPE: i32 = 102;
/// JSON body decoded to something other than an object
pub const EHTTP_INVALID_JSON_DATA: i32 = 103;
/// POST body with a content type the binder cannot decode
pub const EHTTP_UNSUPPORT_CONTENT_TYPE: i32 = 104;
/// Body could not be decoded at all (bad JSON syntax, bad encoding, ...)
pub const EHTTP_MALFORMED_BODY: i32 = 105;
/// A bound value could not be converted to the type a handler asked for
pub const EHTTP_INVALID_ARGUMENT: i32 = 106;

/// Registration-time errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("route method or path not defined in {0}")]
    MissingRouteMetadata(String),

    #[error("invalid handler definition {handler}: {reason}")]
    InvalidHandler { handler: String, reason: String },

    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route {method} {pattern} is already registered")]
    DuplicateRoute { method: String, pattern: String },
}

impl ConfigError {
    pub(crate) fn invalid_handler(handler: &str, reason: impl Into<String>) -> Self {
        Self::InvalidHandler {
            handler: handler.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_pattern(pattern: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Structured error result returned to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("[{retcode}] {message}")]
pub struct ApiError {
    pub retcode: i32,
    pub message: String,
}

impl ApiError {
    pub fn new(retcode: i32, message: impl Into<String>) -> Self {
        Self {
            retcode,
            message: message.into(),
        }
    }

    pub fn missing_argument(name: &str) -> Self {
        Self::new(EMISSING_ARGUMENT, format!("Missing argument {name}"))
    }

    pub fn no_content_type() -> Self {
        Self::new(EHTTP_NO_CONTENT_TYPE, "Missing content type")
    }

    pub fn invalid_json_data() -> Self {
        Self::new(EHTTP_INVALID_JSON_DATA, "Json body must be a dict")
    }

    pub fn unsupported_content_type(content_type: &str) -> Self {
        Self::new(
            EHTTP_UNSUPPORT_CONTENT_TYPE,
            format!("Unsupported content type {content_type}"),
        )
    }

    pub fn malformed_body(detail: impl std::fmt::Display) -> Self {
        Self::new(
            EHTTP_MALFORMED_BODY,
            format!("Malformed request body: {detail}"),
        )
    }

    pub fn invalid_argument(name: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            EHTTP_INVALID_ARGUMENT,
            format!("Invalid argument {name}: {detail}"),
        )
    }

    /// JSON shape sent back to the client
    pub fn to_reply(&self) -> serde_json::Value {
        serde_json::json!({
            "retcode": self.retcode,
            "message": self.message,
        })
    }
}

/// Failure returned by a handler body
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Application-level error, converted into a structured result
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Anything else; surfaces to the server as a fault
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn api(retcode: i32, message: impl Into<String>) -> Self {
        Self::Api(ApiError::new(retcode, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_reply_shape() {
        let reply = ApiError::missing_argument("name").to_reply();
        assert_eq!(
            reply,
            serde_json::json!({"retcode": 101, "message": "Missing argument name"})
        );
    }

    #[test]
    fn test_unsupported_content_type_message() {
        let err = ApiError::unsupported_content_type("text/plain");
        assert_eq!(err.retcode, EHTTP_UNSUPPORT_CONTENT_TYPE);
        assert_eq!(err.message, "Unsupported content type text/plain");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRouteMetadata("list_users".to_string());
        assert_eq!(
            err.to_string(),
            "route method or path not defined in list_users"
        );
    }
}
