//! Handler trait
//!
//! Any `async` closure or function taking [`BoundArgs`] and returning
//! `Result<Reply, HandlerError>` is a handler.

use std::future::Future;
use std::pin::Pin;

use super::args::BoundArgs;
use crate::error::HandlerError;

/// What a handler answers with; rendered as the JSON response body
pub type Reply = serde_json::Value;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>>;

pub trait Handler: Send + Sync + 'static {
    fn call(&self, args: BoundArgs) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
{
    fn call(&self, args: BoundArgs) -> HandlerFuture {
        Box::pin(self(args))
    }
}
