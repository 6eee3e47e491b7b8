//! Compiled per-route dispatch pipelines.
//!
//! At registration time the declarative [`Route`] tree is flattened into
//! one [`RoutePipe`] per endpoint: a fixed, ordered step chain (content
//! decode → content parse → ancestor middlewares → endpoint middlewares →
//! handler → serialize) plus the per-route limits the body accumulator
//! consults. The route tree and the pipes are built once and read-only
//! for the process lifetime.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use fastline_http::codec::body::BodyConfig;
use fastline_http::context::ConnContext;
use fastline_http::protocol::{HeaderTable, Method};
use fastline_http::router::{RouteDef, RouteIndex, RouterBuildError, RouterTree};

use crate::content::encoding::decoder_for;
use crate::content::parser::parser_for;
use crate::content::{BodyValue, ContentExpectation, Expectation};
use crate::response::Respond;
use crate::route::{Handler, Request, Route};
use crate::server::ServerConfig;

/// A compiled route entry: immutable after startup.
pub struct RoutePipe {
    pub pattern: String,
    pub method: Method,
    pub ct: Option<ContentExpectation>,
    /// Body ceiling and until-close opt-in consulted by the accumulator.
    pub body: BodyConfig,
    /// Per-route header-block ceiling, re-checked once the route is known.
    pub max_header_size: usize,
    pub index: RouteIndex,
    steps: Vec<Arc<dyn Handler>>,
    handler: Arc<dyn Handler>,
}

impl std::fmt::Debug for RoutePipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePipe")
            .field("pattern", &self.pattern)
            .field("method", &self.method)
            .field("index", &self.index)
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}

/// All compiled pipes, indexed by the matcher's route index.
#[derive(Debug, Default)]
pub struct Pipelines {
    pipes: Vec<RoutePipe>,
}

impl Pipelines {
    pub fn get(&self, index: RouteIndex) -> Option<&RoutePipe> {
        self.pipes.get(index)
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }
}

/// Flattens the route tree, compiles the matcher, and verifies that every
/// requested route compiled. Any mismatch is fatal at startup.
pub fn compile(root: Route, config: &ServerConfig) -> Result<(Pipelines, RouterTree), RouterBuildError> {
    let mut pipes = Vec::new();
    let mut defs = Vec::new();
    flatten(root, "", &[], &mut pipes, &mut defs, config);

    let mut tree = RouterTree::new();
    let compiled = tree.register_routes(&defs)?;
    if compiled != defs.len() {
        return Err(RouterBuildError::CountMismatch { requested: defs.len(), compiled });
    }
    debug!(routes = compiled, "compiled route pipelines");
    Ok((Pipelines { pipes }, tree))
}

fn flatten(
    route: Route,
    prefix: &str,
    inherited: &[Arc<dyn Handler>],
    pipes: &mut Vec<RoutePipe>,
    defs: &mut Vec<RouteDef>,
    config: &ServerConfig,
) {
    let base = format!("{prefix}{}", route.url);

    let mut middlewares = inherited.to_vec();
    middlewares.extend(route.middlewares.iter().cloned());

    for endpoint in route.endpoints {
        let pattern = normalize_pattern(&format!("{base}{}", endpoint.url));
        let index = pipes.len();
        let mut steps = middlewares.clone();
        steps.extend(endpoint.middlewares);

        defs.push(RouteDef::new(endpoint.method, pattern.clone(), index));
        pipes.push(RoutePipe {
            pattern,
            method: endpoint.method,
            ct: endpoint.ct,
            body: BodyConfig {
                max_content_size: endpoint.max_content_size.unwrap_or(config.max_content_size),
                until_close: endpoint.until_close.unwrap_or(config.until_close),
            },
            max_header_size: endpoint.max_header_size.unwrap_or(config.max_header_size),
            index,
            steps,
            handler: endpoint.handler,
        });
    }

    for child in route.routes {
        flatten(child, &base, &middlewares, pipes, defs, config);
    }
}

/// Collapses duplicate slashes, forces a leading slash and strips the
/// trailing one (except for the root pattern).
fn normalize_pattern(url: &str) -> String {
    let mut out = url.replace('\\', "/");
    while out.contains("//") {
        out = out.replace("//", "/");
    }
    if !out.starts_with('/') {
        out.insert(0, '/');
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

impl RoutePipe {
    /// Validates the request's content headers against this route's
    /// declared expectation: the type dimension first, then the encoding
    /// dimension. Runs after headers complete and before the accumulator
    /// is selected.
    pub fn content_expectation_met(&self, headers: &HeaderTable) -> bool {
        let Some(ct) = &self.ct else {
            return true;
        };
        if let Expectation::Exact(expected) = &ct.type_expect {
            if headers.get("content-type") != Some(expected.as_str()) {
                return false;
            }
        }
        if let Expectation::Exact(expected) = &ct.encoding_expect {
            if headers.get("content-encoding") != Some(expected.as_str()) {
                return false;
            }
        }
        true
    }

    /// Runs the compiled chain over a complete request and serializes the
    /// reply. Steps after a finished response are skipped.
    pub async fn dispatch(&self, body: Option<Bytes>, ctx: &ConnContext, res: &mut dyn Respond) -> Bytes {
        let body = self.prepare_body(body, &ctx.headers);
        let mut req = Request { headers: &ctx.headers, params: &ctx.params, query: &ctx.query, body };

        for step in &self.steps {
            if res.finished() {
                break;
            }
            step.handle(&mut req, res).await;
        }
        if !res.finished() {
            self.handler.handle(&mut req, res).await;
        }
        res.serialize()
    }

    /// Content decode then content parse. A failed transform yields a null
    /// body, passed through for the endpoint to judge.
    fn prepare_body(&self, body: Option<Bytes>, headers: &HeaderTable) -> Option<BodyValue> {
        let mut raw: Option<Vec<u8>> = body.map(|b| b.to_vec());

        let default_expectation = ContentExpectation::default();
        let ct = self.ct.as_ref().unwrap_or(&default_expectation);

        match &ct.encoding_expect {
            Expectation::Exact(encoding) => {
                if let Some(buf) = raw.take() {
                    raw = decoder_for(encoding).and_then(|decode| decode(&buf));
                }
            }
            Expectation::Sniff => {
                if let Some(decode) = headers.get("content-encoding").and_then(decoder_for) {
                    if let Some(buf) = raw.take() {
                        raw = decode(&buf);
                    }
                }
            }
            Expectation::Skip => {}
        }

        let raw = raw?;
        match &ct.type_expect {
            Expectation::Exact(content_type) => parser_for(content_type).and_then(|parse| parse(&raw)),
            Expectation::Sniff => match headers.get("content-type").and_then(parser_for) {
                Some(parse) => parse(&raw),
                None => Some(BodyValue::Raw(raw.into())),
            },
            Expectation::Skip => Some(BodyValue::Raw(raw.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::PipeResponse;
    use crate::route::{get, handler_fn, post};
    use crate::server::ServerConfig;
    use fastline_http::router::RouteOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> ServerConfig {
        ServerConfig::default()
    }

    fn dispatch_ctx() -> ConnContext {
        let mut ctx = ConnContext::new(0);
        ctx.headers.insert("host".to_owned(), "test".to_owned());
        ctx
    }

    #[test]
    fn compile_flattens_nested_routes_with_prefixes() {
        let root = Route::new("/api")
            .add_endpoint(get("/health", handler_fn(|_req, res| res.send(b"ok"))))
            .add_route(Route::new("/users").add_endpoint(get("/:id", handler_fn(|_req, res| res.send(b"user")))));

        let (pipes, tree) = compile(root, &config()).unwrap();
        assert_eq!(pipes.len(), 2);
        assert_eq!(pipes.get(0).unwrap().pattern, "/api/health");
        assert_eq!(pipes.get(1).unwrap().pattern, "/api/users/:id");

        let mut params = Vec::new();
        assert_eq!(tree.match_path(Method::Get, "/api/users/9", &mut params, false), RouteOutcome::Match(1));
        assert_eq!(params, vec!["9".to_owned()]);
    }

    #[test]
    fn normalization_strips_doubled_and_trailing_slashes() {
        assert_eq!(normalize_pattern("/api//users/"), "/api/users");
        assert_eq!(normalize_pattern("api"), "/api");
        assert_eq!(normalize_pattern("/"), "/");
    }

    #[tokio::test]
    async fn middlewares_run_in_registration_order_ancestors_first() {
        static ORDER: AtomicUsize = AtomicUsize::new(0);

        fn mark(expected: usize) -> impl Fn(&mut Request<'_>, &mut dyn Respond) + Send + Sync {
            move |_req, _res| {
                let seen = ORDER.fetch_add(1, Ordering::SeqCst);
                assert_eq!(seen, expected, "step ran out of order");
            }
        }

        let root = Route::new("/").add_middleware(handler_fn(mark(0))).add_route(
            Route::new("/v1").add_middleware(handler_fn(mark(1))).add_endpoint(
                get("/x", handler_fn(|_req, res| res.send(b"done"))).with_middleware(handler_fn(mark(2))),
            ),
        );

        let (pipes, _tree) = compile(root, &config()).unwrap();
        let pipe = pipes.get(0).unwrap();
        let ctx = dispatch_ctx();
        let mut res = PipeResponse::new();
        let wire = pipe.dispatch(None, &ctx, &mut res).await;
        assert!(std::str::from_utf8(&wire).unwrap().ends_with("done"));
        assert_eq!(ORDER.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn finished_response_skips_remaining_steps() {
        let root = Route::new("/").add_endpoint(
            get("/gate", handler_fn(|_req, res| res.send(b"handled by gate")))
                .with_middleware(handler_fn(|_req, res| res.send(b"blocked by middleware"))),
        );

        let (pipes, _tree) = compile(root, &config()).unwrap();
        let ctx = dispatch_ctx();
        let mut res = PipeResponse::new();
        let wire = pipes.get(0).unwrap().dispatch(None, &ctx, &mut res).await;
        assert!(std::str::from_utf8(&wire).unwrap().ends_with("blocked by middleware"));
    }

    #[tokio::test]
    async fn declared_json_type_parses_body() {
        let root = Route::new("/").add_endpoint(
            post(
                "/ingest",
                handler_fn(|req, res| match &req.body {
                    Some(BodyValue::Json(v)) => res.send(v["name"].as_str().unwrap_or("?").as_bytes()),
                    _ => res.send(b"null body"),
                }),
            )
            .expect_content(ContentExpectation::json()),
        );

        let (pipes, _tree) = compile(root, &config()).unwrap();
        let pipe = pipes.get(0).unwrap();
        let ctx = dispatch_ctx();

        let mut res = PipeResponse::new();
        let wire = pipe.dispatch(Some(Bytes::from_static(br#"{"name":"ada"}"#)), &ctx, &mut res).await;
        assert!(std::str::from_utf8(&wire).unwrap().ends_with("ada"));

        // Parse failure passes a null body through instead of failing hard.
        let mut res = PipeResponse::new();
        let wire = pipe.dispatch(Some(Bytes::from_static(b"{broken")), &ctx, &mut res).await;
        assert!(std::str::from_utf8(&wire).unwrap().ends_with("null body"));
    }

    #[tokio::test]
    async fn sniffed_encoding_is_decoded() {
        let root = Route::new("/").add_endpoint(post(
            "/raw",
            handler_fn(|req, res| match &req.body {
                Some(BodyValue::Raw(b)) => res.send(b),
                _ => res.send(b"unexpected"),
            }),
        ));

        let (pipes, _tree) = compile(root, &config()).unwrap();
        let pipe = pipes.get(0).unwrap();

        let mut ctx = dispatch_ctx();
        ctx.headers.insert("content-encoding".to_owned(), "gzip".to_owned());

        let compressed = crate::content::encoding::encoder_for("gzip").unwrap()(b"plain payload").unwrap();
        let mut res = PipeResponse::new();
        let wire = pipe.dispatch(Some(Bytes::from(compressed)), &ctx, &mut res).await;
        assert!(std::str::from_utf8(&wire).unwrap().ends_with("plain payload"));
    }

    #[test]
    fn content_expectation_checks_type_before_encoding() {
        let root = Route::new("/").add_endpoint(
            post("/strict", handler_fn(|_req, res| res.send(b"ok")))
                .expect_content(ContentExpectation::json().encoded("gzip")),
        );
        let (pipes, _tree) = compile(root, &config()).unwrap();
        let pipe = pipes.get(0).unwrap();

        let mut headers = HeaderTable::new();
        // Neither dimension present: the type check fails first.
        assert!(!pipe.content_expectation_met(&headers));

        headers.insert("content-type".to_owned(), "application/json".to_owned());
        assert!(!pipe.content_expectation_met(&headers), "encoding still missing");

        headers.insert("content-encoding".to_owned(), "gzip".to_owned());
        assert!(pipe.content_expectation_met(&headers));
    }

    #[test]
    fn duplicate_patterns_fail_compilation() {
        let root = Route::new("/")
            .add_endpoint(get("/same", handler_fn(|_req, res| res.send(b"a"))))
            .add_endpoint(get("/same", handler_fn(|_req, res| res.send(b"b"))));
        assert!(compile(root, &config()).is_err());
    }
}
