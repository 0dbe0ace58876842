//! Bound-argument mapping passed to handlers

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::signature::REQUEST_PARAM;
use crate::error::ApiError;
use crate::http::IncomingRequest;

/// Arguments bound for one request
///
/// Values come from the JSON body, form fields, query string (each key maps
/// to the list of its values) or path parameters. The request itself is kept
/// apart and answers to the name `request`.
#[derive(Clone, Default)]
pub struct BoundArgs {
    values: Map<String, Value>,
    request: Option<Arc<IncomingRequest>>,
}

impl BoundArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values,
            request: None,
        }
    }

    /// Insert a value, returning the one it replaced
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Fill the `request` slot; a bound value of that name is dropped
    pub(crate) fn set_request(&mut self, request: Arc<IncomingRequest>) {
        self.values.remove(REQUEST_PARAM);
        self.request = Some(request);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// String value of `name`; the first element when the value is a list
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            Value::String(s) => Some(s),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name) || (name == REQUEST_PARAM && self.request.is_some())
    }

    pub fn request(&self) -> Option<&Arc<IncomingRequest>> {
        self.request.as_ref()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values
            .keys()
            .map(String::as_str)
            .chain(self.request.iter().map(|_| REQUEST_PARAM))
    }

    pub fn len(&self) -> usize {
        self.values.len() + usize::from(self.request.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Convert one argument into `T`; `None` when it was not bound
    pub fn take<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ApiError> {
        self.values
            .get(name)
            .map(|v| {
                serde_json::from_value(v.clone()).map_err(|e| ApiError::invalid_argument(name, e))
            })
            .transpose()
    }

    /// Like [`take`](Self::take) but a missing value is an error
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, ApiError> {
        self.take(name)?
            .ok_or_else(|| ApiError::missing_argument(name))
    }

    /// Deserialize every bound value into one struct
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(Value::Object(self.values.clone()))
            .map_err(|e| ApiError::invalid_argument("arguments", e))
    }
}

impl fmt::Debug for BoundArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.values {
            map.entry(key, &format_args!("{value}"));
        }
        if let Some(request) = &self.request {
            map.entry(
                &REQUEST_PARAM,
                &format_args!("<{} {}>", request.method(), request.path()),
            );
        }
        map.finish()
    }
}
