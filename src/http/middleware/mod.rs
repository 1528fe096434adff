//! Middleware chain.
//!
//! # Data Flow
//! ```text
//! Request + Response
//!     → middleware[0] → Continue(req, res) → middleware[1] → ... → handler
//!                     ↘ Halt(reply) → sent as-is, chain stops
//! ```
//!
//! # Design Decisions
//! - Strict registration order, no reentrancy
//! - Ownership of the request and response state is threaded through the
//!   chain, so every mutation is visible to later middleware and the handler
//! - Errors are not caught here; they go to the dispatcher's failure policy

pub mod cors;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::handler::{BoxError, Reply};
use crate::http::request::Request;
use crate::http::response::Response;

pub use cors::{cors, Cors, CorsOptions};

/// Outcome of one middleware step.
#[derive(Debug)]
pub enum Flow {
    /// Hand the (possibly modified) state to the next step.
    Continue(Request, Response),
    /// Short-circuit: skip remaining middleware and the route handler.
    Halt(Reply),
}

/// A request interceptor run before route dispatch.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, request: Request, response: Response) -> BoxFuture<'static, Result<Flow, BoxError>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Flow, BoxError>> + Send + 'static,
{
    fn handle(&self, request: Request, response: Response) -> BoxFuture<'static, Result<Flow, BoxError>> {
        Box::pin(self(request, response))
    }
}

/// Ordered middleware list, immutable once the app is frozen.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    items: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Middleware>(&mut self, middleware: M) {
        self.items.push(Arc::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Run every middleware in order until one halts.
    pub async fn run(&self, mut request: Request, mut response: Response) -> Result<Flow, BoxError> {
        for middleware in &self.items {
            match middleware.handle(request, response).await? {
                Flow::Continue(req, res) => {
                    request = req;
                    response = res;
                }
                halt @ Flow::Halt(_) => return Ok(halt),
            }
        }
        Ok(Flow::Continue(request, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn request() -> Request {
        let raw = axum::http::Request::builder()
            .uri("/")
            .body(axum::body::Body::empty())
            .unwrap();
        Request::new(raw, HashMap::new())
    }

    fn recorder(
        log: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        halt: bool,
    ) -> impl Middleware {
        move |req: Request, res: Response| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
                let res = res.header(format!("X-{}", name), "seen");
                if halt {
                    Ok::<_, BoxError>(Flow::Halt(res.status(401).into()))
                } else {
                    Ok(Flow::Continue(req, res))
                }
            }
        }
    }

    #[tokio::test]
    async fn test_runs_in_order_and_threads_state() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(recorder(log.clone(), "first", false));
        chain.push(recorder(log.clone(), "second", false));

        let flow = chain.run(request(), Response::new()).await.unwrap();
        let Flow::Continue(_, res) = flow else {
            panic!("chain should not halt");
        };
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(res.header_value("X-first"), Some("seen"));
        assert_eq!(res.header_value("X-second"), Some("seen"));
    }

    #[tokio::test]
    async fn test_halt_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.push(recorder(log.clone(), "gate", true));
        chain.push(recorder(log.clone(), "after", false));

        let flow = chain.run(request(), Response::new()).await.unwrap();
        assert!(matches!(flow, Flow::Halt(_)));
        assert_eq!(*log.lock().unwrap(), vec!["gate"]);
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let mut chain = MiddlewareChain::new();
        chain.push(|_req: Request, _res: Response| async move {
            Err::<Flow, BoxError>("boom".into())
        });
        let err = chain.run(request(), Response::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
