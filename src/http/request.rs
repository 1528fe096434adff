//! Request context.
//!
//! # Responsibilities
//! - Wrap one inbound request for middleware and handlers
//! - Expose path parameters extracted at match time
//! - Parse the query string lazily, at most once
//! - Read and decode the body (text, JSON, raw bytes)
//! - Read-only cookie access
//!
//! # Design Decisions
//! - The body is read once and cached, so repeated decoding is cheap
//! - Query parsing stops at the first pair without `=`; a bad escape is an error
//! - `+` is not translated to a space (component decoding, not form decoding)

use std::borrow::Cow;
use std::collections::HashMap;

use axum::body::{Body, Bytes};
use axum::http::{header, request::Parts, HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Default upper bound for buffered request bodies (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Errors raised while reading client input.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The query string contains an invalid escape or non UTF-8 bytes.
    #[error("Failed to parse query: {0}")]
    QueryParse(String),

    /// The body could not be read from the connection.
    #[error("Failed to read body: {0}")]
    BodyRead(String),

    /// The body is not valid for the requested representation.
    #[error("Failed to decode body: {0}")]
    BodyDecode(String),

    /// A previous read failed and the stream is gone.
    #[error("Request body already consumed")]
    BodyConsumed,
}

enum BodyState {
    Pending(Body),
    Buffered(Bytes),
    Consumed,
}

/// Per-request view handed to middleware and handlers.
pub struct Request {
    parts: Parts,
    body: BodyState,
    body_limit: usize,
    params: HashMap<String, String>,
    query: Option<HashMap<String, String>>,
}

impl Request {
    /// Wrap a raw request together with the parameters bound by the matcher.
    pub fn new(raw: axum::extract::Request, params: HashMap<String, String>) -> Self {
        let (parts, body) = raw.into_parts();
        Self {
            parts,
            body: BodyState::Pending(body),
            body_limit: DEFAULT_BODY_LIMIT,
            params,
            query: None,
        }
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw request head.
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Query parameters, parsed on first access.
    pub fn query(&mut self) -> Result<&HashMap<String, String>, RequestError> {
        if self.query.is_none() {
            let parsed = parse_query(self.parts.uri.query().unwrap_or(""))?;
            self.query = Some(parsed);
        }
        Ok(self.query.get_or_insert_with(HashMap::new))
    }

    pub fn query_param(&mut self, name: &str) -> Result<Option<&str>, RequestError> {
        Ok(self.query()?.get(name).map(String::as_str))
    }

    /// Cookies sent with the request, in header order.
    pub fn cookies(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.trim(), value.trim()))
            })
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| value)
    }

    /// Raw body bytes, bounded by the configured limit.
    pub async fn bytes(&mut self) -> Result<Bytes, RequestError> {
        match std::mem::replace(&mut self.body, BodyState::Consumed) {
            BodyState::Pending(body) => {
                let bytes = axum::body::to_bytes(body, self.body_limit)
                    .await
                    .map_err(|e| RequestError::BodyRead(e.to_string()))?;
                self.body = BodyState::Buffered(bytes.clone());
                Ok(bytes)
            }
            BodyState::Buffered(bytes) => {
                self.body = BodyState::Buffered(bytes.clone());
                Ok(bytes)
            }
            BodyState::Consumed => Err(RequestError::BodyConsumed),
        }
    }

    /// Body decoded as UTF-8 text.
    pub async fn text(&mut self) -> Result<String, RequestError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| RequestError::BodyDecode(e.to_string()))
    }

    /// Body decoded as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, RequestError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RequestError::BodyDecode(e.to_string()))
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.parts.method)
            .field("uri", &self.parts.uri)
            .field("params", &self.params)
            .finish()
    }
}

/// Parse `key=value` pairs separated by `&`.
///
/// Scanning stops at the first pair without `=`; everything after it is
/// ignored. Duplicate keys keep the last value.
pub fn parse_query(raw: &str) -> Result<HashMap<String, String>, RequestError> {
    let mut query = HashMap::new();
    if raw.is_empty() {
        return Ok(query);
    }

    for pair in raw.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            break;
        };
        let key = percent_decode(key).ok_or_else(|| RequestError::QueryParse(raw.to_string()))?;
        let value =
            percent_decode(value).ok_or_else(|| RequestError::QueryParse(raw.to_string()))?;
        query.insert(key, value);
    }
    Ok(query)
}

/// Decode a percent-encoded URI component.
///
/// Returns `None` for a malformed escape or a result that is not UTF-8.
pub fn percent_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3)?;
            if !escape.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    urlencoding::decode(raw).ok().map(Cow::into_owned)
}
