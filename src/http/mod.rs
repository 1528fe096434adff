//! HTTP handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, host-stack layers, fallback)
//!     → dispatch.rs (resolve route, run middleware, pick handler)
//!     → request.rs (params, lazy query, body, cookies)
//!     → handler.rs (user code)
//!     → response.rs (status, content type, headers, body)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod handler;
pub mod method;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::{Dispatcher, Outcome};
pub use handler::{BoxError, BoxHandler, Handler, Handlers, Reply};
pub use method::Method;
pub use middleware::{cors, CorsOptions, Flow, Middleware, MiddlewareChain};
pub use request::{Request, RequestError};
pub use response::{HttpResponse, Response, ResponseError};
pub use server::App;
