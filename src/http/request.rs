//! Incoming request abstraction
//!
//! The binder only sees an [`IncomingRequest`]: method, path, query string,
//! content type, the collected body and the path parameters of the matched
//! route. Bodies are collected once, under the configured size limit, before
//! dispatch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures_util::stream::once;
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use thiserror::Error;

/// Path parameters of the matched route
pub type PathParams = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds {0} bytes")]
    TooLarge(usize),

    #[error("failed to read request body: {0}")]
    Read(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid form data: {0}")]
    UrlEncoded(#[from] serde_urlencoded::de::Error),

    #[error("invalid multipart data: {0}")]
    Multipart(#[from] multer::Error),

    #[error("not a form content type: {0}")]
    NotForm(String),
}

#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    match_info: PathParams,
}

impl IncomingRequest {
    /// Build a request from a method and a `path?query` target
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            match_info: PathParams::new(),
        }
    }

    /// Collect a hyper request, failing once the body passes `max_body_size`
    pub async fn from_hyper<B>(req: Request<B>, max_body_size: usize) -> Result<Self, BodyError>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();
        let collected = Limited::new(body, max_body_size)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<http_body_util::LengthLimitError>() {
                    BodyError::TooLarge(max_body_size)
                } else {
                    BodyError::Read(e.to_string())
                }
            })?;

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(ToString::to_string),
            headers: parts.headers,
            body: collected.to_bytes(),
            match_info: PathParams::new(),
        })
    }

    /// Set the body along with its `Content-Type`
    #[must_use]
    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(CONTENT_TYPE, value);
        }
        self.body = body.into();
        self
    }

    /// Set the body without touching headers
    #[must_use]
    pub fn with_raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_match_info(mut self, params: PathParams) -> Self {
        self.match_info = params;
        self
    }

    pub fn set_match_info(&mut self, params: PathParams) {
        self.match_info = params;
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string; `None` when absent or empty
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    pub const fn match_info(&self) -> &PathParams {
        &self.match_info
    }

    /// Media type without parameters, e.g. `multipart/form-data`
    pub fn content_type(&self) -> Option<&str> {
        let raw = self.raw_content_type()?;
        let essence = raw.split(';').next().unwrap_or(raw).trim();
        (!essence.is_empty()).then_some(essence)
    }

    /// Lossy text of a `Content-Type` header that is present but not UTF-8
    pub fn unreadable_content_type(&self) -> Option<String> {
        let value = self.headers.get(CONTENT_TYPE)?;
        if value.to_str().is_ok() {
            return None;
        }
        let lossy = String::from_utf8_lossy(value.as_bytes());
        let essence = lossy.split(';').next().unwrap_or_default().trim();
        Some(essence.to_string())
    }

    fn raw_content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Decode the body as JSON
    pub async fn json(&self) -> Result<Value, BodyError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode the body as form fields
    ///
    /// Urlencoded and multipart bodies are supported. For repeated keys the
    /// first value is kept. A multipart file part is bound as an object with
    /// `filename`, `content_type` and base64 `content`.
    pub async fn form(&self) -> Result<Map<String, Value>, BodyError> {
        let content_type = self
            .content_type()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let pairs = if content_type.starts_with("application/x-www-form-urlencoded") {
            serde_urlencoded::from_bytes::<Vec<(String, String)>>(&self.body)?
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect()
        } else if content_type.starts_with("multipart/form-data") {
            self.multipart_fields().await?
        } else {
            return Err(BodyError::NotForm(content_type));
        };

        let mut fields = Map::new();
        for (key, value) in pairs {
            fields.entry(key).or_insert(value);
        }
        Ok(fields)
    }

    async fn multipart_fields(&self) -> Result<Vec<(String, Value)>, BodyError> {
        let boundary = multer::parse_boundary(self.raw_content_type().unwrap_or_default())?;
        let stream = once(std::future::ready(Ok::<_, Infallible>(self.body.clone())));
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut pairs = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(ToString::to_string) else {
                continue;
            };
            let value = match field.file_name().map(ToString::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(ToString::to_string);
                    let content = field.bytes().await?;
                    json!({
                        "filename": filename,
                        "content_type": content_type,
                        "content": STANDARD.encode(&content),
                    })
                }
                None => Value::String(field.text().await?),
            };
            pairs.push((name, value));
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;

    #[test]
    fn test_target_split() {
        let req = IncomingRequest::new(Method::GET, "/api/users?page=2&q=");
        assert_eq!(req.path(), "/api/users");
        assert_eq!(req.query_string(), Some("page=2&q="));

        let req = IncomingRequest::new(Method::GET, "/api/users?");
        assert_eq!(req.query_string(), None);
    }

    #[test]
    fn test_content_type_essence() {
        let req = IncomingRequest::new(Method::POST, "/")
            .with_body("application/json; charset=utf-8", "{}");
        assert_eq!(req.content_type(), Some("application/json"));

        let req = IncomingRequest::new(Method::POST, "/");
        assert_eq!(req.content_type(), None);
        assert_eq!(req.unreadable_content_type(), None);
    }

    #[test]
    fn test_non_utf8_content_type() {
        let mut req = IncomingRequest::new(Method::POST, "/");
        req.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_bytes(b"text/pl\xe4in; charset=latin1").unwrap(),
        );
        assert_eq!(req.content_type(), None);
        assert_eq!(req.unreadable_content_type().as_deref(), Some("text/pl\u{fffd}in"));
    }

    #[tokio::test]
    async fn test_urlencoded_form_first_value_wins() {
        let req = IncomingRequest::new(Method::POST, "/")
            .with_body("application/x-www-form-urlencoded", "name=alice&tag=a&tag=b&empty=");
        let form = req.form().await.unwrap();
        assert_eq!(form["name"], "alice");
        assert_eq!(form["tag"], "a");
        assert_eq!(form["empty"], "");
    }

    #[tokio::test]
    async fn test_multipart_form_binds_files() {
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            hello\r\n\
            --XyZ\r\n\
            Content-Disposition: form-data; name=\"upload\"; filename=\"a.txt\"\r\n\
            Content-Type: text/plain\r\n\r\n\
            file contents\r\n\
            --XyZ--\r\n";
        let req = IncomingRequest::new(Method::POST, "/")
            .with_body("multipart/form-data; boundary=XyZ", body);
        let form = req.form().await.unwrap();
        assert_eq!(form.len(), 2);
        assert_eq!(form["title"], "hello");
        assert_eq!(
            form["upload"],
            json!({
                "filename": "a.txt",
                "content_type": "text/plain",
                "content": "ZmlsZSBjb250ZW50cw==",
            })
        );
    }

    #[tokio::test]
    async fn test_json_syntax_error() {
        let req = IncomingRequest::new(Method::POST, "/").with_body("application/json", "{oops");
        assert!(matches!(req.json().await, Err(BodyError::Json(_))));
    }

    #[tokio::test]
    async fn test_from_hyper_collects_body() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/notes?draft=1")
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(r#"{"title":"x"}"#)))
            .unwrap();
        let incoming = IncomingRequest::from_hyper(req, 1024).await.unwrap();
        assert_eq!(incoming.path(), "/notes");
        assert_eq!(incoming.query_string(), Some("draft=1"));
        assert_eq!(incoming.json().await.unwrap()["title"], "x");
    }

    #[tokio::test]
    async fn test_from_hyper_body_limit() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/notes")
            .body(Full::new(Bytes::from(vec![b'a'; 64])))
            .unwrap();
        let err = IncomingRequest::from_hyper(req, 16).await.unwrap_err();
        assert!(matches!(err, BodyError::TooLarge(16)));
    }
}
