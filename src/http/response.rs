//! Response building.
//!
//! # Responsibilities
//! - Accumulate status, content type, headers and body for one request
//! - Finalize the accumulated state into an immutable wire response
//! - Produce the fixed plain-text responses (404, 405, 500)
//!
//! # Design Decisions
//! - `Content-Type` is synthesized from the content-type field first and the
//!   explicit headers are applied over it, so an explicit header wins
//! - Header names compare case-insensitively; setting one twice overwrites
//! - Validation of status and headers happens once, in `build()`

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use thiserror::Error;

/// The wire response handed to the host server.
pub type HttpResponse = axum::response::Response;

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_HTML: &str = "text/html";

/// Errors raised while assembling a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("Failed to serialize JSON body: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid status code {0}")]
    InvalidStatus(u16),

    #[error("Invalid header \"{0}\"")]
    InvalidHeader(String),
}

/// Mutable per-request response state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    code: u16,
    content_type: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            code: 200,
            content_type: TEXT_PLAIN.to_string(),
            headers: Vec::new(),
            body: String::new(),
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fixed plain-text response.
    pub fn init(status: StatusCode, body: impl Into<String>) -> HttpResponse {
        (
            status,
            [(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
            body.into(),
        )
            .into_response()
    }

    /// Serialize `data` as the body and switch to `application/json`.
    pub fn json<T: Serialize + ?Sized>(mut self, data: &T) -> Result<Self, ResponseError> {
        self.body = serde_json::to_string(data)?;
        self.content_type = APPLICATION_JSON.to_string();
        Ok(self)
    }

    /// Plain-text body.
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.content_type = TEXT_PLAIN.to_string();
        self
    }

    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.content_type = TEXT_HTML.to_string();
        self
    }

    pub fn status(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Add or overwrite one header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }
        self
    }

    pub fn status_code(&self) -> u16 {
        self.code
    }

    pub fn content_type_value(&self) -> &str {
        &self.content_type
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Finalize into a wire response. Building twice yields equivalent responses.
    pub fn build(&self) -> Result<HttpResponse, ResponseError> {
        let status =
            StatusCode::from_u16(self.code).map_err(|_| ResponseError::InvalidStatus(self.code))?;

        let mut headers = HeaderMap::new();
        let content_type = HeaderValue::from_str(&self.content_type)
            .map_err(|_| ResponseError::InvalidHeader(CONTENT_TYPE.to_string()))?;
        headers.insert(CONTENT_TYPE, content_type);

        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| ResponseError::InvalidHeader(key.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| ResponseError::InvalidHeader(key.clone()))?;
            headers.insert(name, value);
        }

        let mut response = HttpResponse::new(Body::from(self.body.clone()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> HttpResponse {
        match self.build() {
            Ok(response) => response,
            Err(e) => Response::init(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal Server Error: {}", e),
            ),
        }
    }
}
