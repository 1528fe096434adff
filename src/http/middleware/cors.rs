//! CORS middleware.
//! Sets the standard CORS response headers and answers preflight requests.

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::http::handler::BoxError;
use crate::http::middleware::{Flow, Middleware};
use crate::http::request::Request;
use crate::http::response::Response;

/// CORS settings.
#[derive(Debug, Clone)]
pub struct CorsOptions {
    pub origin: String,
    pub methods: Vec<String>,
    pub headers: Vec<String>,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            origin: "*".to_string(),
            methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            headers: ["Content-Type", "Authorization"].map(String::from).to_vec(),
        }
    }
}

/// Prepared CORS middleware.
#[derive(Debug, Clone)]
pub struct Cors {
    origin: String,
    allow_methods: String,
    allow_headers: String,
    allow_credentials: &'static str,
}

/// Build a CORS middleware. `OPTIONS` requests are answered with 204.
pub fn cors(options: CorsOptions) -> Cors {
    Cors {
        allow_methods: options.methods.join(", "),
        allow_headers: options.headers.join(", "),
        // Credentials are only meaningful with an explicit origin.
        allow_credentials: if options.origin == "*" { "false" } else { "true" },
        origin: options.origin,
    }
}

impl Middleware for Cors {
    fn handle(&self, request: Request, response: Response) -> BoxFuture<'static, Result<Flow, BoxError>> {
        let response = response
            .header("Access-Control-Allow-Origin", self.origin.as_str())
            .header("Access-Control-Allow-Methods", self.allow_methods.as_str())
            .header("Access-Control-Allow-Headers", self.allow_headers.as_str())
            .header("Access-Control-Allow-Credentials", self.allow_credentials);

        let flow: Result<Flow, BoxError> = if request.method() == axum::http::Method::OPTIONS {
            Ok(Flow::Halt(response.status(204).into()))
        } else {
            Ok(Flow::Continue(request, response))
        };
        future::ready(flow).boxed()
    }
}
