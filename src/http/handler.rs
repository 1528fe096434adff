//! Route handler abstraction.
//!
//! # Responsibilities
//! - Define the async handler signature `(Request, Response) -> Result<Reply, BoxError>`
//! - Adapt plain async functions and closures into shareable handlers
//! - Group per-method handlers for one path
//!
//! # Design Decisions
//! - Request and response state are passed by value; the handler hands the
//!   state back inside its [`Reply`] instead of mutating a shared object
//! - Any error type converts into [`BoxError`] so handlers can use `?` freely

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::method::Method;
use crate::http::request::Request;
use crate::http::response::{HttpResponse, Response, ResponseError};

/// Error type returned by handlers and middleware.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// What a handler produces.
#[derive(Debug)]
pub enum Reply {
    /// Response state to be finalized with [`Response::build`].
    State(Response),
    /// A finished response, sent verbatim.
    Http(HttpResponse),
}

impl Reply {
    /// Finalize into the wire response.
    pub fn into_http(self) -> Result<HttpResponse, ResponseError> {
        match self {
            Reply::State(state) => state.build(),
            Reply::Http(response) => Ok(response),
        }
    }
}

impl From<Response> for Reply {
    fn from(state: Response) -> Self {
        Reply::State(state)
    }
}

impl From<HttpResponse> for Reply {
    fn from(response: HttpResponse) -> Self {
        Reply::Http(response)
    }
}

/// An async route handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request, response: Response) -> BoxFuture<'static, Result<Reply, BoxError>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, BoxError>> + Send + 'static,
{
    fn call(&self, request: Request, response: Response) -> BoxFuture<'static, Result<Reply, BoxError>> {
        Box::pin(self(request, response))
    }
}

/// Per-method handler set for a single path.
#[derive(Clone, Default)]
pub struct Handlers {
    map: BTreeMap<Method, BoxHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the handler for `method`, replacing any previous one.
    pub fn on<H: Handler>(mut self, method: Method, handler: H) -> Self {
        self.map.insert(method, Arc::new(handler));
        self
    }

    pub fn get<H: Handler>(self, handler: H) -> Self {
        self.on(Method::Get, handler)
    }

    pub fn post<H: Handler>(self, handler: H) -> Self {
        self.on(Method::Post, handler)
    }

    pub fn put<H: Handler>(self, handler: H) -> Self {
        self.on(Method::Put, handler)
    }

    pub fn delete<H: Handler>(self, handler: H) -> Self {
        self.on(Method::Delete, handler)
    }

    pub fn patch<H: Handler>(self, handler: H) -> Self {
        self.on(Method::Patch, handler)
    }

    pub fn options<H: Handler>(self, handler: H) -> Self {
        self.on(Method::Options, handler)
    }

    pub fn head<H: Handler>(self, handler: H) -> Self {
        self.on(Method::Head, handler)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn insert_boxed(&mut self, method: Method, handler: BoxHandler) {
        self.map.insert(method, handler);
    }

    pub(crate) fn into_inner(self) -> BTreeMap<Method, BoxHandler> {
        self.map
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.map.keys()).finish()
    }
}
