//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check the bind address parses
//! - Check default headers are legal HTTP headers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address \"{0}\" is not a socket address")]
    InvalidBindAddress(String),

    #[error("limits.{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("headers.default contains invalid header \"{0}\"")]
    InvalidHeader(String),

    #[error("routes.extensions must not be empty")]
    NoExtensions,

    #[error("routes.extensions entry \"{0}\" must be a bare extension without dots")]
    InvalidExtension(String),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.limits.body_bytes == 0 {
        errors.push(ValidationError::ZeroLimit("body_bytes"));
    }
    if config.limits.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroLimit("request_timeout_secs"));
    }

    for (name, value) in &config.headers.default {
        if HeaderName::from_bytes(name.as_bytes()).is_err()
            || HeaderValue::from_str(value).is_err()
        {
            errors.push(ValidationError::InvalidHeader(name.clone()));
        }
    }

    if config.routes.extensions.is_empty() {
        errors.push(ValidationError::NoExtensions);
    }
    for ext in &config.routes.extensions {
        if ext.is_empty() || ext.contains('.') {
            errors.push(ValidationError::InvalidExtension(ext.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
