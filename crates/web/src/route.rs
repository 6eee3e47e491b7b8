//! Declarative route, endpoint and middleware definitions.
//!
//! These are the registration-time inputs: a nestable [`Route`] group
//! carrying middlewares, and per-method [`Endpoint`]s with optional
//! content expectations and limit overrides. Everything here is consumed
//! by pipeline compilation at startup; nothing is touched on the hot path.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fastline_http::protocol::{HeaderTable, Method};

use crate::content::{BodyValue, ContentExpectation};
use crate::response::Respond;

/// The parsed request view handed to middlewares and endpoint handlers.
#[derive(Debug)]
pub struct Request<'a> {
    pub headers: &'a HeaderTable,
    /// Path-parameter values, in pattern declaration order.
    pub params: &'a [String],
    pub query: &'a HashMap<String, String>,
    /// Decoded and parsed body; `None` for bodyless requests and for
    /// decode/parse failures — the endpoint decides what a null body means.
    pub body: Option<BodyValue>,
}

/// A pipeline step: middlewares and endpoint handlers share this shape.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: &mut Request<'_>, res: &mut dyn Respond);
}

/// Adapts a synchronous closure into a [`Handler`].
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut Request<'_>, &mut dyn Respond) + Send + Sync,
{
    async fn handle(&self, req: &mut Request<'_>, res: &mut dyn Respond) {
        (self.f)(req, res);
    }
}

pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut Request<'_>, &mut dyn Respond) + Send + Sync,
{
    HandlerFn { f }
}

/// One endpoint: method + path pattern + handler chain + local limits.
pub struct Endpoint {
    pub(crate) url: String,
    pub(crate) method: Method,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) middlewares: Vec<Arc<dyn Handler>>,
    pub(crate) ct: Option<ContentExpectation>,
    pub(crate) until_close: Option<bool>,
    pub(crate) max_content_size: Option<usize>,
    pub(crate) max_header_size: Option<usize>,
}

impl Endpoint {
    pub fn new(method: Method, url: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self {
            url: url.into(),
            method,
            handler: Arc::new(handler),
            middlewares: Vec::new(),
            ct: None,
            until_close: None,
            max_content_size: None,
            max_header_size: None,
        }
    }

    /// Appends a middleware run before the handler, after any route-level
    /// middlewares.
    pub fn with_middleware(mut self, middleware: impl Handler + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Declares the content type/encoding this endpoint accepts.
    pub fn expect_content(mut self, ct: ContentExpectation) -> Self {
        self.ct = Some(ct);
        self
    }

    /// Opts into reading a body until stream end when length framing is
    /// absent. Overrides the server-wide setting.
    pub fn wait_until_close(mut self, value: bool) -> Self {
        self.until_close = Some(value);
        self
    }

    /// Per-endpoint body-size ceiling override.
    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_content_size = Some(bytes);
        self
    }

    /// Per-endpoint header-block ceiling override.
    pub fn max_header_size(mut self, bytes: usize) -> Self {
        self.max_header_size = Some(bytes);
        self
    }
}

macro_rules! endpoint_method {
    ($name:ident, $variant:ident) => {
        #[doc = concat!("Creates a ", stringify!($variant), " endpoint.")]
        pub fn $name(url: impl Into<String>, handler: impl Handler + 'static) -> Endpoint {
            Endpoint::new(Method::$variant, url, handler)
        }
    };
}

endpoint_method!(get, Get);
endpoint_method!(post, Post);
endpoint_method!(put, Put);
endpoint_method!(delete, Delete);
endpoint_method!(patch, Patch);
endpoint_method!(head, Head);
endpoint_method!(options, Options);

/// A routing group: base path, endpoints, middlewares applied to every
/// descendant, and nested child groups.
pub struct Route {
    pub(crate) url: String,
    pub(crate) endpoints: Vec<Endpoint>,
    pub(crate) middlewares: Vec<Arc<dyn Handler>>,
    pub(crate) routes: Vec<Route>,
}

impl Route {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), endpoints: Vec::new(), middlewares: Vec::new(), routes: Vec::new() }
    }

    pub fn add_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn add_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Middleware applied to this group's endpoints and all child groups,
    /// ahead of endpoint-local middlewares.
    pub fn add_middleware(mut self, middleware: impl Handler + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }
}
