//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{HeaderMap, Request as HttpRequest, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use pompom::{App, BoxError, Error, Reply, Request, Response, Shutdown};

/// Response pieces captured by [`send`].
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("response body is not JSON")
    }
}

/// Drive one request through the router in-process.
pub async fn send(router: &Router, method: &str, uri: &str, body: &str) -> TestResponse {
    let request = HttpRequest::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .expect("valid request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");

    TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, "GET", uri, "").await
}

/// Freeze `app` into a router, panicking on route conflicts.
pub fn router(app: App) -> Router {
    app.into_router().expect("routes compile")
}

/// Serve `app` on an ephemeral port. Trigger the returned [`Shutdown`] to stop it.
pub async fn start_server(app: App) -> (SocketAddr, Shutdown, JoinHandle<Result<(), Error>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let handle = tokio::spawn(app.serve(listener, rx));
    (addr, shutdown, handle)
}

pub async fn hello(_req: Request, res: Response) -> Result<Reply, BoxError> {
    Ok(res.text("Hello, world!").into())
}
