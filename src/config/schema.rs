//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identifier sent in the `X-Powered-By` header.
pub const POWERED_BY: &str = "Pom-Pom";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request limits and timeouts.
    pub limits: LimitsConfig,

    /// Headers attached to every response.
    pub headers: HeadersConfig,

    /// File-based route discovery.
    pub routes: RoutesConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered request body size in bytes.
    pub body_bytes: usize,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            body_bytes: crate::http::request::DEFAULT_BODY_LIMIT,
            request_timeout_secs: 30,
        }
    }
}

/// Default response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeadersConfig {
    /// Send `X-Powered-By: Pom-Pom`.
    pub powered_by: bool,

    /// Added to every response unless the handler already set them.
    pub default: BTreeMap<String, String>,
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            powered_by: true,
            default: BTreeMap::new(),
        }
    }
}

impl HeadersConfig {
    /// The effective default header list.
    ///
    /// A configured `X-Powered-By` entry replaces the built-in value.
    pub fn resolved(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .default
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if self.powered_by
            && !headers
                .iter()
                .any(|(k, _)| k.eq_ignore_ascii_case("X-Powered-By"))
        {
            headers.insert(0, ("X-Powered-By".to_string(), POWERED_BY.to_string()));
        }
        headers
    }
}

/// File-based route discovery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Directory to walk at startup (disabled when unset).
    pub dir: Option<PathBuf>,

    /// File extensions treated as route files, without the dot.
    pub extensions: Vec<String>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            dir: None,
            extensions: vec!["rs".to_string()],
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Prometheus exporter address (disabled when unset).
    pub metrics_address: Option<SocketAddr>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "pompom=info,tower_http=info".to_string(),
            json_logs: false,
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.limits.request_timeout_secs, 30);
        assert!(config.headers.powered_by);
        assert_eq!(
            config.headers.resolved(),
            vec![("X-Powered-By".to_string(), "Pom-Pom".to_string())]
        );
        assert_eq!(config.routes.extensions, vec!["rs"]);
        assert!(config.routes.dir.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: AppConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8080"

            [routes]
            dir = "routes"

            [headers.default]
            X-Frame-Options = "DENY"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.routes.dir, Some(PathBuf::from("routes")));
        assert_eq!(config.routes.extensions, vec!["rs"]);
        assert_eq!(
            config.headers.resolved(),
            vec![
                ("X-Powered-By".to_string(), "Pom-Pom".to_string()),
                ("X-Frame-Options".to_string(), "DENY".to_string()),
            ]
        );
    }

    #[test]
    fn test_powered_by_can_be_replaced_or_disabled() {
        let mut headers = HeadersConfig::default();
        headers
            .default
            .insert("x-powered-by".to_string(), "custom".to_string());
        assert_eq!(
            headers.resolved(),
            vec![("x-powered-by".to_string(), "custom".to_string())]
        );

        let headers = HeadersConfig {
            powered_by: false,
            ..HeadersConfig::default()
        };
        assert!(headers.resolved().is_empty());
    }
}
