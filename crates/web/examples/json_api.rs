//! A small JSON API: declared content types, middleware, and per-route
//! body limits.

use fastline_web::{BodyValue, ContentExpectation, CorsConfig, Route, Server, get, handler_fn, post};
use http::StatusCode;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let api = Route::new("/api")
        .add_middleware(handler_fn(|req, _res| {
            info!(agent = req.headers.get("user-agent").unwrap_or("-"), "incoming request");
        }))
        .add_endpoint(get("/health", handler_fn(|_req, res| {
            res.json(&serde_json::json!({"status": "up"}));
        })))
        .add_endpoint(
            post("/items", handler_fn(|req, res| match &req.body {
                Some(BodyValue::Json(item)) => {
                    res.set_status(StatusCode::CREATED);
                    res.json(&serde_json::json!({"accepted": item}));
                }
                _ => {
                    res.set_status(StatusCode::UNPROCESSABLE_ENTITY);
                    res.json(&serde_json::json!({"error": "body must be JSON"}));
                }
            }))
            .expect_content(ContentExpectation::json())
            .max_body_size(64 * 1024),
        );

    Server::builder()
        .routes(Route::new("/").add_route(api))
        .cors(CorsConfig { allow_any_origin: true, ..CorsConfig::default() })
        .build()
        .expect("route compilation failed")
        .start("127.0.0.1:3000")
        .await;
}
