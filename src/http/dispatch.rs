//! Request dispatch.
//!
//! # State Machine
//! ```text
//! Pending → MiddlewareRunning → { ShortCircuited | Dispatching }
//!         → { Handled | MethodNotAllowed | NotFound | Failed } → Sent
//! ```
//!
//! # Responsibilities
//! - Resolve the request path against the frozen route snapshot
//! - Run the middleware chain, then the handler for the request method
//! - Map unmatched paths to 404 and unmatched methods to 405
//! - Map handler/middleware errors and panics to 500
//! - Attach default headers, log and count the outcome
//!
//! # Design Decisions
//! - Middleware run for every request, matched or not
//! - Every request produces exactly one response; nothing escapes to the host server

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{HeaderMap, StatusCode};
use futures_util::FutureExt;

use crate::http::handler::BoxError;
use crate::http::method::Method;
use crate::http::middleware::{Flow, MiddlewareChain};
use crate::http::request::{Request, DEFAULT_BODY_LIMIT};
use crate::http::response::{HttpResponse, Response};
use crate::observability::metrics;
use crate::routing::table::RouteSnapshot;

pub const NOT_FOUND_BODY: &str = "Not Found";
pub const METHOD_NOT_ALLOWED_BODY: &str = "Method Not Allowed";

/// Terminal state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    ShortCircuited,
    Handled,
    MethodNotAllowed,
    NotFound,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::ShortCircuited => "short_circuited",
            Outcome::Handled => "handled",
            Outcome::MethodNotAllowed => "method_not_allowed",
            Outcome::NotFound => "not_found",
            Outcome::Failed => "failed",
        }
    }
}

/// Everything needed to serve requests; shared read-only across tasks.
pub struct Dispatcher {
    routes: RouteSnapshot,
    middleware: MiddlewareChain,
    default_headers: HeaderMap,
    body_limit: usize,
}

impl Dispatcher {
    pub fn new(routes: RouteSnapshot, middleware: MiddlewareChain) -> Self {
        Self {
            routes,
            middleware,
            default_headers: HeaderMap::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn routes(&self) -> &RouteSnapshot {
        &self.routes
    }

    /// Serve one request. Never fails.
    pub async fn dispatch(&self, raw: axum::extract::Request) -> HttpResponse {
        let start = Instant::now();
        let method = raw.method().clone();
        let path = raw.uri().path().to_string();

        let (mut response, outcome) = match AssertUnwindSafe(self.run(raw)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(method = %method, path = %path, error = %e, "Request failed");
                (internal_error(&e.to_string()), Outcome::Failed)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(method = %method, path = %path, panic = %message, "Handler panicked");
                (internal_error(&message), Outcome::Failed)
            }
        };

        self.apply_default_headers(&mut response);

        let status = response.status();
        tracing::debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            outcome = outcome.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request dispatched"
        );
        metrics::record_request(method.as_str(), status.as_u16(), outcome.as_str(), start);

        response
    }

    async fn run(&self, raw: axum::extract::Request) -> Result<(HttpResponse, Outcome), BoxError> {
        // Pending
        let (entry, params) = match self.routes.resolve(raw.uri().path()) {
            Some(matched) => (Some(matched.entry), matched.params),
            None => (None, HashMap::new()),
        };
        let request = Request::new(raw, params).with_body_limit(self.body_limit);

        // MiddlewareRunning
        let (request, response) = match self.middleware.run(request, Response::new()).await? {
            Flow::Continue(request, response) => (request, response),
            Flow::Halt(reply) => return Ok((reply.into_http()?, Outcome::ShortCircuited)),
        };

        // Dispatching
        let Some(entry) = entry else {
            return Ok((
                Response::init(StatusCode::NOT_FOUND, NOT_FOUND_BODY),
                Outcome::NotFound,
            ));
        };

        let handler = Method::from_http(request.method()).and_then(|m| entry.handler(m));
        let Some(handler) = handler else {
            return Ok((
                Response::init(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY),
                Outcome::MethodNotAllowed,
            ));
        };

        let reply = handler.call(request, response).await?;
        Ok((reply.into_http()?, Outcome::Handled))
    }

    fn apply_default_headers(&self, response: &mut HttpResponse) {
        let headers = response.headers_mut();
        for (name, value) in &self.default_headers {
            if !headers.contains_key(name) {
                headers.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Convert configured `(name, value)` pairs into a header map, skipping
/// entries that are not legal headers.
pub fn header_map(pairs: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Ignoring invalid default header"),
        }
    }
    map
}

fn internal_error(message: &str) -> HttpResponse {
    Response::init(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Internal Server Error: {}", message),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
