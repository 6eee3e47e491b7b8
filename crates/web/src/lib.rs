//! Routing, dispatch pipelines and the pooled server loop on top of
//! `fastline-http`.
//!
//! Routes are declared as nestable [`Route`] groups of [`Endpoint`]s and
//! compiled once at startup into per-route pipelines; the server drives
//! each socket through the core's scanner and body accumulator and runs
//! the matched pipeline when a request is body-complete.
//!
//! ```no_run
//! use fastline_web::{Route, Server, get, handler_fn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let routes = Route::new("/")
//!         .add_endpoint(get("/hello", handler_fn(|_req, res| res.send(b"hello world"))));
//!
//!     let server = Server::builder().routes(routes).build().expect("route compilation failed");
//!     server.start("127.0.0.1:8080").await;
//! }
//! ```

mod connection;
mod pipeline;
mod response;
mod route;
mod server;

pub mod content;

pub use content::{BodyValue, ContentExpectation, Expectation};
pub use pipeline::Pipelines;
pub use pipeline::RoutePipe;
pub use response::PipeResponse;
pub use response::Respond;
pub use response::RespondCtor;
pub use response::templates;
pub use route::{Endpoint, Handler, HandlerFn, Request, Route, handler_fn};
pub use route::{delete, get, head, options, patch, post, put};
pub use server::{CorsConfig, Server, ServerBuildError, ServerBuilder, ServerConfig};
