//! Application builder and HTTP server.
//!
//! # Responsibilities
//! - Collect routes and middleware during setup
//! - Discover file routes into the same table
//! - Freeze everything into a [`Dispatcher`] behind an axum fallback
//! - Wire host-stack layers (timeout, request ID, tracing)
//! - Bind, serve, and shut down gracefully
//!
//! # Design Decisions
//! - `into_router`, `serve` and `listen` consume the `App`: routes cannot be
//!   added once serving starts
//! - Every path is handled by one fallback; matching is done by the route
//!   snapshot, not by axum's router

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::broadcast;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::Error;
use crate::http::dispatch::{header_map, Dispatcher};
use crate::http::handler::{Handler, Handlers};
use crate::http::middleware::{Middleware, MiddlewareChain};
use crate::http::response::HttpResponse;
use crate::lifecycle::{shutdown, signals, Shutdown};
use crate::observability::metrics;
use crate::routing::files::{register_routes, LoadError, LoadReport, ModuleLoader};
use crate::routing::table::{RouteError, RouteTable};

/// Application under construction.
pub struct App {
    config: AppConfig,
    routes: RouteTable,
    middleware: MiddlewareChain,
}

impl App {
    /// Create an app with the default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            middleware: MiddlewareChain::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Routes registered so far.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Append a middleware. Middleware run in the order they are added.
    pub fn use_middleware<M: Middleware>(&mut self, middleware: M) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Register a set of method handlers for `path`.
    pub fn route(&mut self, path: &str, handlers: Handlers) -> Result<&mut Self, RouteError> {
        let entry = self.routes.register_all(path, handlers)?;
        tracing::debug!(path = %entry.path(), methods = ?entry.methods(), "Registered route");
        Ok(self)
    }

    pub fn get<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(path, Handlers::new().get(handler))
    }

    pub fn post<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(path, Handlers::new().post(handler))
    }

    pub fn put<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(path, Handlers::new().put(handler))
    }

    pub fn delete<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(path, Handlers::new().delete(handler))
    }

    pub fn patch<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(path, Handlers::new().patch(handler))
    }

    pub fn options<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(path, Handlers::new().options(handler))
    }

    pub fn head<H: Handler>(&mut self, path: &str, handler: H) -> Result<&mut Self, RouteError> {
        self.route(path, Handlers::new().head(handler))
    }

    /// Discover route files under `dir` and register their handlers.
    ///
    /// Files are matched against `routes.extensions` from the configuration.
    pub async fn load_routes<L>(&mut self, dir: impl AsRef<Path>, loader: &L) -> Result<LoadReport, LoadError>
    where
        L: ModuleLoader + ?Sized,
    {
        register_routes(
            &mut self.routes,
            dir.as_ref(),
            &self.config.routes.extensions,
            loader,
        )
        .await
    }

    /// Freeze the app into an axum router.
    pub fn into_router(self) -> Result<Router, RouteError> {
        let snapshot = self.routes.snapshot()?;
        metrics::record_route_count(snapshot.len());

        let dispatcher = Dispatcher::new(snapshot, self.middleware)
            .with_default_headers(header_map(&self.config.headers.resolved()))
            .with_body_limit(self.config.limits.body_bytes);

        let timeout = Duration::from_secs(self.config.limits.request_timeout_secs);

        Ok(Router::new()
            .fallback(dispatch_handler)
            .with_state(Arc::new(dispatcher))
            .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
    }

    /// Serve on an already-bound listener until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), Error> {
        let router = self.into_router()?;
        serve_router(router, listener, shutdown).await
    }

    /// Bind `addr`, invoke `callback` with the bound address, and serve until
    /// Ctrl+C or SIGTERM.
    pub async fn listen<A, F>(self, addr: A, callback: F) -> Result<(), Error>
    where
        A: ToSocketAddrs,
        F: FnOnce(SocketAddr),
    {
        let router = self.into_router()?;
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        let signal_task = signals::spawn_signal_listener(shutdown);

        callback(local);
        let result = serve_router(router, listener, rx).await;
        signal_task.abort();
        result
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

async fn serve_router(router: Router, listener: TcpListener, rx: broadcast::Receiver<()>) -> Result<(), Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown::wait(rx))
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn dispatch_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: axum::extract::Request,
) -> HttpResponse {
    dispatcher.dispatch(request).await
}
