//! Route table
//!
//! Endpoints are declared with their method, path pattern, signature and
//! handler, then registered into a [`Router`] at startup. Each registration
//! analyses the signature once and keeps a shared [`RequestBinder`].

use hyper::Method;
use std::fmt;
use std::sync::Arc;

use super::matcher::PathPattern;
use crate::binding::{Handler, RequestBinder, Signature};
use crate::error::ConfigError;
use crate::http::PathParams;
use crate::logger;

/// A handler together with its route metadata
pub struct Endpoint {
    method: Option<Method>,
    path: Option<String>,
    signature: Signature,
    handler: Arc<dyn Handler>,
}

impl Endpoint {
    /// Endpoint without route metadata; it cannot be registered on its own
    pub fn new(signature: Signature, handler: impl Handler) -> Self {
        Self {
            method: None,
            path: None,
            signature,
            handler: Arc::new(handler),
        }
    }

    pub fn route(
        method: Method,
        path: impl Into<String>,
        signature: Signature,
        handler: impl Handler,
    ) -> Self {
        Self::new(signature, handler).at(method, path)
    }

    pub fn get(path: impl Into<String>, signature: Signature, handler: impl Handler) -> Self {
        Self::route(Method::GET, path, signature, handler)
    }

    pub fn post(path: impl Into<String>, signature: Signature, handler: impl Handler) -> Self {
        Self::route(Method::POST, path, signature, handler)
    }

    /// Attach route metadata; the handler itself is unchanged
    #[must_use]
    pub fn at(mut self, method: Method, path: impl Into<String>) -> Self {
        self.method = Some(method);
        self.path = Some(path.into());
        self
    }

    pub fn name(&self) -> &str {
        self.signature.name()
    }

    pub const fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    fn has_route(&self) -> bool {
        self.method.is_some() && self.path.is_some()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// One registered route
pub struct RouteEntry {
    pub method: Method,
    pub pattern: PathPattern,
    pub binder: Arc<RequestBinder>,
}

/// Result of looking a request up in the table
pub enum Resolution {
    Found {
        binder: Arc<RequestBinder>,
        params: PathParams,
    },
    /// The path exists, but only for these methods
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// Ordered route table, built at startup and read-only afterwards
#[derive(Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one endpoint; it must carry both a method and a path
    pub fn register(&mut self, endpoint: Endpoint) -> Result<(), ConfigError> {
        let (Some(method), Some(path)) = (endpoint.method.clone(), endpoint.path.clone()) else {
            return Err(ConfigError::MissingRouteMetadata(endpoint.name().to_string()));
        };

        let pattern = PathPattern::parse(&path)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern == pattern)
        {
            return Err(ConfigError::DuplicateRoute {
                method: method.to_string(),
                pattern: path,
            });
        }

        let binder = RequestBinder::new(&endpoint.signature, endpoint.handler)?;
        logger::log_route_added(
            method.as_str(),
            pattern.as_str(),
            endpoint.signature.name(),
            &endpoint.signature.param_list(),
        );

        self.routes.push(RouteEntry {
            method,
            pattern,
            binder: Arc::new(binder),
        });
        Ok(())
    }

    /// Register every endpoint that carries route metadata, skipping the rest
    ///
    /// Returns how many endpoints were registered. Stops at the first
    /// configuration error.
    pub fn register_all(
        &mut self,
        endpoints: impl IntoIterator<Item = Endpoint>,
    ) -> Result<usize, ConfigError> {
        let mut registered = 0;
        for endpoint in endpoints {
            if !endpoint.has_route() {
                logger::log_route_skipped(endpoint.name());
                continue;
            }
            self.register(endpoint)?;
            registered += 1;
        }
        Ok(registered)
    }

    /// Find the route for `method` and `path`, in registration order
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        let mut allowed = Vec::new();
        for route in &self.routes {
            let Some(params) = route.pattern.match_path(path) else {
                continue;
            };
            if route.method == *method {
                return Resolution::Found {
                    binder: Arc::clone(&route.binder),
                    params,
                };
            }
            if !allowed.contains(&route.method) {
                allowed.push(route.method.clone());
            }
        }

        if allowed.is_empty() {
            Resolution::NotFound
        } else {
            Resolution::MethodNotAllowed(allowed)
        }
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{BoundArgs, Reply};
    use crate::error::HandlerError;
    use serde_json::json;

    async fn ok(_args: BoundArgs) -> Result<Reply, HandlerError> {
        Ok(json!({"ok": true}))
    }

    fn notes_endpoints() -> Vec<Endpoint> {
        vec![
            Endpoint::get("/notes", Signature::new("list_notes").var_keyword("kw"), ok),
            Endpoint::post("/notes", Signature::new("create_note").keyword("title"), ok),
            Endpoint::get("/notes/{id}", Signature::new("get_note").positional("id"), ok),
            Endpoint::new(Signature::new("helper"), ok),
        ]
    }

    #[test]
    fn test_register_requires_metadata() {
        let mut router = Router::new();
        let err = router
            .register(Endpoint::new(Signature::new("helper"), ok))
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingRouteMetadata("helper".to_string()));
        assert!(router.is_empty());
    }

    #[test]
    fn test_register_all_skips_untagged() {
        let mut router = Router::new();
        let registered = router.register_all(notes_endpoints()).unwrap();
        assert_eq!(registered, 3);
        assert_eq!(router.len(), 3);
    }

    #[test]
    fn test_register_rejects_bad_handler() {
        let mut router = Router::new();
        let endpoint = Endpoint::get(
            "/x/{id}",
            Signature::new("bad").request().positional("id"),
            ok,
        );
        assert!(matches!(
            router.register(endpoint),
            Err(ConfigError::InvalidHandler { .. })
        ));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = Router::new();
        router
            .register(Endpoint::get("/notes", Signature::new("a"), ok))
            .unwrap();
        let err = router
            .register(Endpoint::get("/notes", Signature::new("b"), ok))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRoute { .. }));

        router
            .register(Endpoint::post("/notes", Signature::new("c"), ok))
            .unwrap();
    }

    #[test]
    fn test_resolve() {
        let mut router = Router::new();
        router.register_all(notes_endpoints()).unwrap();

        match router.resolve(&Method::GET, "/notes/12") {
            Resolution::Found { binder, params } => {
                assert_eq!(binder.descriptor().name, "get_note");
                assert_eq!(params["id"], "12");
            }
            _ => panic!("expected a match"),
        }

        match router.resolve(&Method::POST, "/notes") {
            Resolution::Found { binder, .. } => assert_eq!(binder.descriptor().name, "create_note"),
            _ => panic!("expected a match"),
        }

        match router.resolve(&Method::DELETE, "/notes") {
            Resolution::MethodNotAllowed(allowed) => {
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            _ => panic!("expected 405"),
        }

        assert!(matches!(
            router.resolve(&Method::GET, "/missing"),
            Resolution::NotFound
        ));
    }
}
