//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registration and dispatch produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (request counters and latency histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings, for machine parsing
//! - Request ID (`x-request-id`) is attached by the HTTP layer
//! - Metrics are recorded even when no exporter is installed (no-op recorder)

pub mod logging;
pub mod metrics;
