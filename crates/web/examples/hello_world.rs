use fastline_web::{Route, Server, get, handler_fn};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let routes = Route::new("/")
        .add_endpoint(get("/", handler_fn(|_req, res| res.send(b"hello world\r\n"))))
        .add_endpoint(get("/hello/:name", handler_fn(|req, res| {
            let name = req.params.first().map_or("stranger", String::as_str);
            res.send(format!("hello, {name}!\r\n").as_bytes());
        })));

    Server::builder()
        .routes(routes)
        .build()
        .expect("route compilation failed")
        .start("127.0.0.1:3000")
        .await;
}
