//! Server configuration, pooled resources and the accept loop.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use fastline_http::context::ConnContext;
use fastline_http::limits::{
    DEFAULT_MAX_HEADER_NAME_SIZE, DEFAULT_MAX_HEADER_SIZE, DEFAULT_MAX_HEADER_VALUE_SIZE, DEFAULT_MAX_URL_SIZE,
    DEFAULT_QUERY_LIMIT, ScanLimits,
};
use fastline_http::pool::ObjectPool;
use fastline_http::router::{RouterBuildError, RouterTree};

use crate::connection;
use crate::pipeline::{Pipelines, compile};
use crate::response::{PipeResponse, Respond, RespondCtor, templates};
use crate::route::Route;

/// Default body-size ceiling: 3 MiB.
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 3 * 1024 * 1024;

/// Default socket timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default pool capacity, which bounds concurrent connections.
pub const DEFAULT_MAX_REQUESTS: usize = 5000;

/// Server-wide limits and behavior switches. Endpoints may override the
/// body ceiling, header ceiling and until-close opt-in per route.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_header_size: usize,
    pub max_header_name_size: usize,
    pub max_header_value_size: usize,
    pub max_url_size: usize,
    pub query_limit: usize,
    pub max_content_size: usize,
    /// Whether routes without their own opt-in wait for stream end when
    /// length framing is missing.
    pub until_close: bool,
    pub timeout: Duration,
    /// Pool capacity for connection contexts and response objects.
    pub max_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_header_name_size: DEFAULT_MAX_HEADER_NAME_SIZE,
            max_header_value_size: DEFAULT_MAX_HEADER_VALUE_SIZE,
            max_url_size: DEFAULT_MAX_URL_SIZE,
            query_limit: DEFAULT_QUERY_LIMIT,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            until_close: false,
            timeout: DEFAULT_TIMEOUT,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

impl ServerConfig {
    pub(crate) fn scan_limits(&self) -> ScanLimits {
        ScanLimits {
            max_header_size: self.max_header_size,
            max_header_name_size: self.max_header_name_size,
            max_header_value_size: self.max_header_value_size,
            max_url_size: self.max_url_size,
            query_limit: self.query_limit,
        }
    }
}

/// CORS configuration; the fields map one-to-one onto the
/// `Access-Control-*` response headers.
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Emits `Access-Control-Allow-Origin: *`, overriding `allowed_origins`.
    pub allow_any_origin: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub credentials: Option<bool>,
    pub max_age: Option<u64>,
}

impl CorsConfig {
    /// Pre-builds the header block injected into preflight and not-found
    /// templates, one `Name: value\r\n` line per configured field.
    pub(crate) fn header_block(&self) -> String {
        let mut out = String::new();
        let origins = if self.allow_any_origin {
            Some("*".to_owned())
        } else if self.allowed_origins.is_empty() {
            None
        } else {
            Some(self.allowed_origins.join(","))
        };
        if let Some(value) = origins {
            out.push_str(&format!("Access-Control-Allow-Origin: {value}\r\n"));
        }
        if !self.allowed_methods.is_empty() {
            out.push_str(&format!("Access-Control-Allow-Methods: {}\r\n", self.allowed_methods.join(",")));
        }
        if !self.allowed_headers.is_empty() {
            out.push_str(&format!("Access-Control-Allow-Headers: {}\r\n", self.allowed_headers.join(",")));
        }
        if !self.exposed_headers.is_empty() {
            out.push_str(&format!("Access-Control-Expose-Headers: {}\r\n", self.exposed_headers.join(",")));
        }
        if let Some(credentials) = self.credentials {
            out.push_str(&format!("Access-Control-Allow-Credentials: {credentials}\r\n"));
        }
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("Access-Control-Max-Age: {max_age}\r\n"));
        }
        out
    }
}

/// Fatal configuration errors surfaced before the listener starts.
#[derive(Debug, Error)]
pub enum ServerBuildError {
    #[error("no routes registered")]
    MissingRoutes,

    #[error("route compilation failed: {0}")]
    Router(#[from] RouterBuildError),
}

pub struct ServerBuilder {
    config: ServerConfig,
    cors: Option<CorsConfig>,
    root: Option<Route>,
    respond_ctor: RespondCtor,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            cors: None,
            root: None,
            respond_ctor: Arc::new(|| Box::new(PipeResponse::new())),
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn routes(mut self, root: Route) -> Self {
        self.root = Some(root);
        self
    }

    pub fn cors(mut self, cors: CorsConfig) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Swaps the response implementation used to populate the response
    /// pool.
    pub fn respond_with(mut self, ctor: impl Fn() -> Box<dyn Respond> + Send + Sync + 'static) -> Self {
        self.respond_ctor = Arc::new(ctor);
        self
    }

    /// Compiles routes, pre-constructs both pools, and freezes the
    /// configuration.
    pub fn build(self) -> Result<Server, ServerBuildError> {
        let root = self.root.ok_or(ServerBuildError::MissingRoutes)?;
        let (pipes, router) = compile(root, &self.config)?;

        let mut ctx_pool = ObjectPool::new(self.config.max_requests);
        while ctx_pool.register_with(ConnContext::new).is_some() {}
        let mut resp_pool = ObjectPool::new(self.config.max_requests);
        while resp_pool.register((self.respond_ctor)()).is_some() {}

        let cors = self.cors.map(|cfg| {
            let block = cfg.header_block();
            CorsState { preflight: templates::cors_preflight(&block), not_found: templates::cors_not_found(&block) }
        });

        Ok(Server {
            limits: self.config.scan_limits(),
            config: self.config,
            cors,
            pipes,
            router,
            respond_ctor: self.respond_ctor,
            ctx_pool: Mutex::new(ctx_pool),
            resp_pool: Mutex::new(resp_pool),
        })
    }
}

pub(crate) struct CorsState {
    pub(crate) preflight: bytes::Bytes,
    pub(crate) not_found: bytes::Bytes,
}

/// The running engine: compiled routes, limits, and the two pools shared
/// by every connection. Pools are the only cross-connection state; their
/// locks are held only for allocate/free, never across awaits.
pub struct Server {
    pub(crate) config: ServerConfig,
    pub(crate) limits: ScanLimits,
    pub(crate) cors: Option<CorsState>,
    pub(crate) pipes: Pipelines,
    pub(crate) router: RouterTree,
    respond_ctor: RespondCtor,
    pub(crate) ctx_pool: Mutex<ObjectPool<ConnContext>>,
    pub(crate) resp_pool: Mutex<ObjectPool<Box<dyn Respond>>>,
}

/// Recovers a usable guard even if a panicking task poisoned the lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub(crate) fn cors_enabled(&self) -> bool {
        self.cors.is_some()
    }

    pub(crate) fn allocate_response(&self) -> Option<(usize, Box<dyn Respond>)> {
        lock(&self.resp_pool).allocate()
    }

    pub(crate) fn release_response(&self, slot: usize, mut resp: Box<dyn Respond>) {
        resp.reset();
        lock(&self.resp_pool).free(slot, resp);
    }

    /// Resizes both pools to `n` slots. Growth registers fresh objects
    /// immediately; shrink only affects future allocations and leaves
    /// checked-out slots valid until freed. Never called from the hot
    /// path.
    pub fn set_max_requests(&self, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        {
            let mut pool = lock(&self.ctx_pool);
            pool.resize(n);
            while pool.register_with(ConnContext::new).is_some() {}
        }
        {
            let mut pool = lock(&self.resp_pool);
            pool.resize(n);
            while pool.register((self.respond_ctor)()).is_some() {}
        }
        true
    }

    /// Accepts connections forever. Each socket gets a pooled context and
    /// its own task; when the pool is exhausted the socket is closed
    /// immediately rather than queued.
    pub async fn serve(self, listener: TcpListener) {
        info!(addr = ?listener.local_addr().ok(), "listening");
        let server = Arc::new(self);

        loop {
            let (stream, remote) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            let allocated = lock(&server.ctx_pool).allocate();
            let Some((slot, ctx)) = allocated else {
                debug!(%remote, "connection pool exhausted, dropping socket");
                drop(stream);
                continue;
            };

            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let mut ctx = connection::drive(&server, stream, ctx).await;
                ctx.reset();
                lock(&server.ctx_pool).free(slot, ctx);
            });
        }
    }

    /// Binds `addr` and serves on it.
    pub async fn start(self, addr: &str) {
        match TcpListener::bind(addr).await {
            Ok(listener) => self.serve(listener).await,
            Err(e) => error!(cause = %e, addr, "bind server error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{get, handler_fn};

    #[test]
    fn config_defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.max_header_size, 10 * 1024);
        assert_eq!(config.max_header_name_size, 512);
        assert_eq!(config.max_header_value_size, 1024);
        assert_eq!(config.max_content_size, 3 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(3000));
        assert_eq!(config.max_requests, 5000);
        assert!(!config.until_close);
    }

    #[test]
    fn cors_header_block_lists_configured_fields() {
        let cors = CorsConfig {
            allow_any_origin: true,
            allowed_methods: vec!["GET".to_owned(), "POST".to_owned()],
            credentials: Some(true),
            max_age: Some(600),
            ..CorsConfig::default()
        };
        let block = cors.header_block();
        assert!(block.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(block.contains("Access-Control-Allow-Methods: GET,POST\r\n"));
        assert!(block.contains("Access-Control-Allow-Credentials: true\r\n"));
        assert!(block.contains("Access-Control-Max-Age: 600\r\n"));
        assert!(!block.contains("Access-Control-Allow-Headers"));
    }

    #[test]
    fn build_without_routes_fails() {
        assert!(matches!(Server::builder().build(), Err(ServerBuildError::MissingRoutes)));
    }

    #[test]
    fn set_max_requests_resizes_both_pools() {
        let config = ServerConfig { max_requests: 2, ..ServerConfig::default() };
        let server = Server::builder()
            .config(config)
            .routes(Route::new("/").add_endpoint(get("/x", handler_fn(|_req, res| res.send(b"x")))))
            .build()
            .unwrap();

        assert!(server.set_max_requests(4));
        let mut taken = Vec::new();
        for _ in 0..4 {
            taken.push(lock(&server.ctx_pool).allocate().expect("grown slot should allocate"));
        }
        assert!(lock(&server.ctx_pool).allocate().is_none());
        assert!(!server.set_max_requests(0));
    }

    #[test]
    fn build_populates_both_pools() {
        let mut config = ServerConfig::default();
        config.max_requests = 8;
        let server = Server::builder()
            .config(config)
            .routes(Route::new("/").add_endpoint(get("/x", handler_fn(|_req, res| res.send(b"x")))))
            .build()
            .unwrap();
        assert_eq!(lock(&server.ctx_pool).capacity(), 8);
        assert!(server.allocate_response().is_some());
    }
}
