//! Pom-Pom: a small routing framework on top of axum.
//!
//! Routes are registered on an [`App`] (by hand or discovered from a
//! directory tree), frozen into a radix-tree snapshot, and served through a
//! single dispatcher that runs middleware, path parameters, and handlers.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::AppConfig;
pub use error::Error;
pub use http::{
    cors, App, BoxError, CorsOptions, Flow, Handlers, HttpResponse, Method, Reply, Request,
    Response,
};
pub use lifecycle::Shutdown;
pub use routing::{LoadReport, ModuleLoader, ModuleRegistry, RouteFile, RouteModule};
