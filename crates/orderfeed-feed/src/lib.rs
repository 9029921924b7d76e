//! Recent-orders feed reconciliation.
//!
//! Keeps a bounded, deduplicated, newest-first list of recently created
//! orders consistent across three independent inputs: a one-shot snapshot
//! read, a live subscription of created orders, and a persisted copy that
//! survives restarts.

pub mod config;
pub mod error;
pub mod feed_store;
pub mod parser;
pub mod source;

pub use config::{FeedConfig, OrderingPolicy};
pub use error::{FeedError, FeedResult};
pub use feed_store::{
    FeedPhase, FeedStats, FeedStatsSnapshot, IngestOutcome, OrderFeedStore, OrderSink,
};
pub use parser::{LiveEventParser, ParserStats};
pub use parser::LAST_ORDER_CREATED;
pub use source::{
    backfill, BoxFuture, IngestReport, JsonFileSnapshot, LivePump, SnapshotEntry, SnapshotSource,
    StaticSnapshot,
};
