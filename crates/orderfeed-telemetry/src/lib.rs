//! Prometheus metrics and structured logging for the recent-orders feed.
//!
//! - Structured logging with tracing (pretty in development, JSON in production)
//! - Prometheus collectors for ingest outcomes, evictions, feed length and
//!   persistence failures, rendered in the text exposition format

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
