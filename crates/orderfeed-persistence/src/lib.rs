//! Durable storage for the recent-orders feed.
//!
//! The feed is stored as a single JSON array under one fixed key of a
//! string-valued key/value store:
//! - `KeyValueStore`: the storage seam (`get` / `set` / `remove`)
//! - `FileStore`: one file per key, replaced atomically on write
//! - `MemoryStore`: in-process map for tests and ephemeral runs
//! - `FeedCodec`: JSON encoding of the feed with strict decode

pub mod codec;
pub mod error;
pub mod store;

pub use codec::FeedCodec;
pub use error::{PersistenceError, PersistenceResult};
pub use store::{validate_key, FileStore, KeyValueStore, MemoryStore, DEFAULT_STORAGE_KEY};
