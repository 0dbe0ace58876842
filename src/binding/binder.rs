//! Request binder
//!
//! Turns one [`IncomingRequest`] into the [`BoundArgs`] of a handler and
//! calls it. Steps, in order:
//!
//! 1. Decode body or query only when the handler takes named arguments.
//! 2. POST: JSON object, urlencoded or multipart body, by content type.
//! 3. GET: query string, each key bound to the list of its values.
//! 4. Nothing decoded: the path parameters are the arguments.
//! 5. Otherwise keep only declared names (unless there is a catch-all), then
//!    merge path parameters over them. Path parameters win.
//! 6. Add the request itself when the handler declares `request`.
//! 7. Reject the request if a required keyword argument is still missing.
//! 8. Call the handler; application errors become structured results.

use hyper::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Instrument;

use super::args::BoundArgs;
use super::handler::{Handler, Reply};
use super::signature::{HandlerDescriptor, Signature};
use crate::error::{ApiError, ConfigError, HandlerError};
use crate::http::{IncomingRequest, PathParams};
use crate::logger;

/// Per-handler binder, built once at registration and shared by all requests
pub struct RequestBinder {
    descriptor: HandlerDescriptor,
    handler: Arc<dyn Handler>,
}

impl RequestBinder {
    pub fn new(signature: &Signature, handler: Arc<dyn Handler>) -> Result<Self, ConfigError> {
        Ok(Self {
            descriptor: HandlerDescriptor::analyze(signature)?,
            handler,
        })
    }

    pub const fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    /// Build the argument mapping for `request` without calling the handler
    pub async fn bind(&self, request: &Arc<IncomingRequest>) -> Result<BoundArgs, ApiError> {
        let extracted = if self.descriptor.needs_extraction() {
            extract_kwargs(request).await?
        } else {
            None
        };

        let mut args = match extracted {
            None => path_args(request.match_info()),
            Some(kw) => {
                let mut args = BoundArgs::from_map(self.keep_declared(kw));
                merge_path_params(&mut args, request.match_info());
                args
            }
        };

        if self.descriptor.has_request_arg {
            args.set_request(Arc::clone(request));
        }

        if let Some(name) = self
            .descriptor
            .required_kw_args
            .iter()
            .find(|name| !args.contains(name))
        {
            return Err(ApiError::missing_argument(name));
        }

        Ok(args)
    }

    /// Bind and invoke the handler
    ///
    /// Binding failures and [`HandlerError::Api`] come back as `Ok` with the
    /// structured `{retcode, message}` reply. Only
    /// [`HandlerError::Internal`] is returned as `Err`.
    pub async fn dispatch(&self, request: Arc<IncomingRequest>) -> anyhow::Result<Reply> {
        let args = match self.bind(&request).await {
            Ok(args) => args,
            Err(e) => {
                logger::log_bind_rejected(request.path(), &e);
                return Ok(e.to_reply());
            }
        };

        logger::log_dispatch(request.path(), &args);
        let span = tracing::info_span!(
            "dispatch",
            handler = %self.descriptor.name,
            method = %request.method(),
            path = %request.path(),
        );

        match self.handler.call(args).instrument(span).await {
            Ok(reply) => Ok(reply),
            Err(HandlerError::Api(e)) => Ok(e.to_reply()),
            Err(HandlerError::Internal(e)) => Err(e),
        }
    }

    /// Without a catch-all only declared keyword-only names survive
    fn keep_declared(&self, mut kw: Map<String, Value>) -> Map<String, Value> {
        if self.descriptor.has_var_kw_arg {
            return kw;
        }
        let mut kept = Map::new();
        for name in &self.descriptor.named_kw_args {
            if let Some(value) = kw.remove(name) {
                kept.insert(name.clone(), value);
            }
        }
        kept
    }
}

/// Decode the keyword sources of a request, if it carries any
async fn extract_kwargs(request: &IncomingRequest) -> Result<Option<Map<String, Value>>, ApiError> {
    match *request.method() {
        Method::POST => {
            let content_type = match request.content_type() {
                Some(content_type) => content_type.to_ascii_lowercase(),
                None => {
                    return Err(request.unreadable_content_type().map_or_else(
                        ApiError::no_content_type,
                        |raw| ApiError::unsupported_content_type(&raw.to_ascii_lowercase()),
                    ));
                }
            };

            if content_type.starts_with("application/json") {
                match request.json().await.map_err(ApiError::malformed_body)? {
                    Value::Object(map) => Ok(Some(map)),
                    _ => Err(ApiError::invalid_json_data()),
                }
            } else if content_type.starts_with("application/x-www-form-urlencoded")
                || content_type.starts_with("multipart/form-data")
            {
                let form = request.form().await.map_err(ApiError::malformed_body)?;
                Ok(Some(form))
            } else {
                Err(ApiError::unsupported_content_type(&content_type))
            }
        }
        Method::GET => request.query_string().map(parse_query).transpose(),
        _ => Ok(None),
    }
}

/// Parse a query string into key -> list of values, keeping blank values
pub fn parse_query(query: &str) -> Result<Map<String, Value>, ApiError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_str(query).map_err(ApiError::malformed_body)?;

    let mut kw = Map::new();
    for (key, value) in pairs {
        if let Value::Array(values) = kw.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
            values.push(Value::String(value));
        }
    }
    Ok(kw)
}

fn path_args(params: &PathParams) -> BoundArgs {
    let mut args = BoundArgs::new();
    for (key, value) in params {
        args.insert(key.clone(), Value::String(value.clone()));
    }
    args
}

/// Merge path parameters over `args`, returning the names that collided
pub fn merge_path_params(args: &mut BoundArgs, params: &PathParams) -> Vec<String> {
    let mut collisions = Vec::new();
    for (key, value) in params {
        if args.insert(key.clone(), Value::String(value.clone())).is_some() {
            logger::log_duplicate_arg(key);
            collisions.push(key.clone());
        }
    }
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{
        EHTTP_INVALID_JSON_DATA, EHTTP_MALFORMED_BODY, EHTTP_NO_CONTENT_TYPE,
        EHTTP_UNSUPPORT_CONTENT_TYPE,
    };
    use hyper::header::HeaderValue;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    fn echo() -> Arc<dyn Handler> {
        Arc::new(|args: BoundArgs| async move {
            Ok::<_, HandlerError>(Value::Object(args.values().clone()))
        })
    }

    fn binder(signature: &Signature) -> RequestBinder {
        RequestBinder::new(signature, echo()).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> PathParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_path_only_handler_ignores_body_and_query() {
        let b = binder(&Signature::new("get_user").positional("id"));

        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/users/42?x=1")
                .with_body("application/json", r#"{"name":"bob"}"#)
                .with_match_info(params(&[("id", "42")])),
        );
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.values(), &json!({"id": "42"}).as_object().cloned().unwrap());

        let req = Arc::new(
            IncomingRequest::new(Method::GET, "/users/42?x=1")
                .with_match_info(params(&[("id", "42")])),
        );
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args.str("id"), Some("42"));
    }

    #[tokio::test]
    async fn test_post_without_content_type() {
        let b = binder(&Signature::new("create").var_keyword("kw"));
        let req = Arc::new(IncomingRequest::new(Method::POST, "/notes").with_raw_body("{}"));
        let reply = b.dispatch(req).await.unwrap();
        assert_eq!(
            reply,
            json!({"retcode": EHTTP_NO_CONTENT_TYPE, "message": "Missing content type"})
        );
    }

    #[tokio::test]
    async fn test_json_body_must_be_object() {
        let b = binder(&Signature::new("create").keyword("title"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/notes").with_body("application/json", "[1, 2]"),
        );
        let reply = b.dispatch(req).await.unwrap();
        assert_eq!(
            reply,
            json!({"retcode": EHTTP_INVALID_JSON_DATA, "message": "Json body must be a dict"})
        );
    }

    #[tokio::test]
    async fn test_unsupported_content_type() {
        let b = binder(&Signature::new("create").var_keyword("kw"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/notes").with_body("text/plain", "hello"),
        );
        let reply = b.dispatch(req).await.unwrap();
        assert_eq!(
            reply,
            json!({
                "retcode": EHTTP_UNSUPPORT_CONTENT_TYPE,
                "message": "Unsupported content type text/plain"
            })
        );
    }

    #[tokio::test]
    async fn test_non_utf8_content_type_is_unsupported() {
        let b = binder(&Signature::new("create").var_keyword("kw"));
        let req = hyper::Request::builder()
            .method(Method::POST)
            .uri("/notes")
            .header("content-type", HeaderValue::from_bytes(b"Text/\xffPlain").unwrap())
            .body(http_body_util::Full::new(bytes::Bytes::from_static(b"{}")))
            .unwrap();
        let req = Arc::new(IncomingRequest::from_hyper(req, 1024).await.unwrap());

        let err = b.bind(&req).await.unwrap_err();
        assert_eq!(err.retcode, EHTTP_UNSUPPORT_CONTENT_TYPE);
        assert_eq!(err.message, "Unsupported content type text/\u{fffd}plain");
    }

    #[tokio::test]
    async fn test_content_type_is_case_insensitive() {
        let b = binder(&Signature::new("create").keyword("title"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/notes")
                .with_body("Application/JSON; charset=UTF-8", r#"{"title":"t"}"#),
        );
        assert_eq!(b.bind(&req).await.unwrap().str("title"), Some("t"));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let b = binder(&Signature::new("create").keyword("title"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/notes").with_body("application/json", "{"),
        );
        let err = b.bind(&req).await.unwrap_err();
        assert_eq!(err.retcode, EHTTP_MALFORMED_BODY);
    }

    #[tokio::test]
    async fn test_query_string_lists() {
        let b = binder(&Signature::new("search").var_keyword("kw"));
        let req = Arc::new(IncomingRequest::new(Method::GET, "/search?a=1&b=2"));
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.get("a"), Some(&json!(["1"])));
        assert_eq!(args.get("b"), Some(&json!(["2"])));
    }

    #[test]
    fn test_parse_query_repeated_and_blank() {
        let kw = parse_query("tag=a&tag=b&empty=&flag").unwrap();
        assert_eq!(kw["tag"], json!(["a", "b"]));
        assert_eq!(kw["empty"], json!([""]));
        assert_eq!(kw["flag"], json!([""]));
    }

    #[tokio::test]
    async fn test_named_keywords_filter_undeclared() {
        let b = binder(&Signature::new("create").keyword("title").keyword_with_default("body"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/notes")
                .with_body("application/json", r#"{"title":"t","admin":true}"#),
        );
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["title"]);
    }

    #[tokio::test]
    async fn test_form_body_binding() {
        let b = binder(&Signature::new("login").keyword("user").keyword("password"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/login")
                .with_body("application/x-www-form-urlencoded", "user=ann&password=pw&x=1"),
        );
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.str("user"), Some("ann"));
        assert_eq!(args.str("password"), Some("pw"));
        assert!(!args.contains("x"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_path_params_win_on_collision() {
        let b = binder(&Signature::new("update").positional("id").var_keyword("kw"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/notes/fromPath")
                .with_body("application/json", r#"{"id":"fromBody","title":"t"}"#)
                .with_match_info(params(&[("id", "fromPath")])),
        );
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.str("id"), Some("fromPath"));
        assert_eq!(args.str("title"), Some("t"));
        assert!(logs_contain("duplicate arg id"));
    }

    #[test]
    fn test_merge_reports_collisions() {
        let mut args = BoundArgs::new();
        args.insert("id", json!("fromBody"));
        let collisions = merge_path_params(&mut args, &params(&[("id", "fromPath"), ("v", "2")]));
        assert_eq!(collisions, vec!["id"]);
        assert_eq!(args.str("id"), Some("fromPath"));
        assert_eq!(args.str("v"), Some("2"));
    }

    #[tokio::test]
    async fn test_missing_required_argument_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler: Arc<dyn Handler> = Arc::new(move |_args: BoundArgs| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, HandlerError>(json!({}))
            }
        });
        let b = RequestBinder::new(&Signature::new("greet").keyword("name"), handler).unwrap();

        let req = Arc::new(IncomingRequest::new(Method::GET, "/greet"));
        let reply = b.dispatch(req).await.unwrap();
        assert_eq!(reply, json!({"retcode": 101, "message": "Missing argument name"}));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_required_argument_from_path() {
        let b = binder(&Signature::new("greet").keyword("name"));
        let req = Arc::new(
            IncomingRequest::new(Method::GET, "/greet/ann")
                .with_match_info(params(&[("name", "ann")])),
        );
        let reply = b.dispatch(req).await.unwrap();
        assert_eq!(reply, json!({"name": "ann"}));
    }

    #[tokio::test]
    async fn test_request_argument_is_bound() {
        let handler: Arc<dyn Handler> = Arc::new(|args: BoundArgs| async move {
            let request = args.request().expect("request bound");
            Ok::<_, HandlerError>(json!({"path": request.path()}))
        });
        let b = RequestBinder::new(&Signature::new("whoami").request(), handler).unwrap();
        let req = Arc::new(IncomingRequest::new(Method::GET, "/whoami"));
        assert_eq!(b.dispatch(req).await.unwrap(), json!({"path": "/whoami"}));
    }

    #[tokio::test]
    async fn test_request_argument_replaces_client_value() {
        let b = binder(&Signature::new("audit").request().var_keyword("kw"));
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/audit")
                .with_body("application/json", r#"{"request":"spoof","a":1}"#),
        );
        let args = b.bind(&req).await.unwrap();

        assert_eq!(args.get("request"), None);
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["a", "request"]);
        assert_eq!(args.len(), 2);
        assert_eq!(args.request().unwrap().path(), "/audit");
        assert_eq!(args.values(), json!({"a": 1}).as_object().unwrap());
    }

    #[tokio::test]
    async fn test_multipart_upload_reaches_handler() {
        let b = binder(&Signature::new("upload").keyword("title").keyword("file"));
        let body = "--b\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            report\r\n\
            --b\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"r.csv\"\r\n\
            Content-Type: text/csv\r\n\r\n\
            a,b\r\n\
            --b--\r\n";
        let req = Arc::new(
            IncomingRequest::new(Method::POST, "/upload")
                .with_body("multipart/form-data; boundary=b", body),
        );
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.str("title"), Some("report"));
        assert_eq!(
            args.get("file"),
            Some(&json!({"filename": "r.csv", "content_type": "text/csv", "content": "YSxi"}))
        );
    }

    #[tokio::test]
    async fn test_application_error_becomes_result() {
        let handler: Arc<dyn Handler> = Arc::new(|_args: BoundArgs| async move {
            Err::<Reply, _>(HandlerError::api(404, "note not found"))
        });
        let b = RequestBinder::new(&Signature::new("get_note"), handler).unwrap();
        let req = Arc::new(IncomingRequest::new(Method::GET, "/notes/9"));
        assert_eq!(
            b.dispatch(req).await.unwrap(),
            json!({"retcode": 404, "message": "note not found"})
        );
    }

    #[tokio::test]
    async fn test_internal_error_propagates() {
        let handler: Arc<dyn Handler> = Arc::new(|_args: BoundArgs| async move {
            Err::<Reply, _>(HandlerError::Internal(anyhow::anyhow!("disk on fire")))
        });
        let b = RequestBinder::new(&Signature::new("boom"), handler).unwrap();
        let req = Arc::new(IncomingRequest::new(Method::GET, "/boom"));
        let err = b.dispatch(req).await.unwrap_err();
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[tokio::test]
    async fn test_put_binds_path_params_only() {
        let b = binder(&Signature::new("replace").positional("id").var_keyword("kw"));
        let req = Arc::new(
            IncomingRequest::new(Method::PUT, "/notes/3")
                .with_body("application/json", r#"{"title":"t"}"#)
                .with_match_info(params(&[("id", "3")])),
        );
        let args = b.bind(&req).await.unwrap();
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["id"]);
    }
}
