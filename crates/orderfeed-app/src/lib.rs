//! Recent-orders feed host.
//!
//! Wires the feed to its collaborators:
//! - Persistent store (file or in-memory) chosen by configuration
//! - Optional one-shot snapshot backfill from a JSON file
//! - Live subscription payloads read as JSON lines
//! - Metrics and structured logging for every ingest

pub mod app;
pub mod config;
pub mod error;

pub use app::{render_feed, Application};
pub use config::{AppConfig, StorageBackend, StorageConfig};
pub use error::{AppError, AppResult};
