//! The order feed store.
//!
//! Owns the reconciled feed: a newest-first list of at most `capacity`
//! orders with unique ids. All mutations run under one lock that also covers
//! the persist step, so dedup, insert, evict and write are never interleaved
//! between two callers. The in-memory feed is authoritative; the persistent
//! store is written after every mutation and only read back by `initialize`.

use crate::config::{FeedConfig, OrderingPolicy};
use crate::error::{FeedError, FeedResult};
use crate::source::{backfill, IngestReport, SnapshotSource};
use orderfeed_core::{Order, OrderId};
use orderfeed_persistence::{FeedCodec, KeyValueStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle phase of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    /// Created, store not read yet. Mutations are refused.
    Uninitialized,
    /// Hydrated and accepting events.
    Ready,
}

impl fmt::Display for FeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "UNINITIALIZED"),
            Self::Ready => write!(f, "READY"),
        }
    }
}

/// Result of a successful `ingest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Order added; `evicted` lists ids pushed off the tail.
    Inserted { evicted: Vec<OrderId> },
    /// An order with this id is already in the feed. Nothing changed.
    Duplicate,
    /// Full feed and the order sorts below its tail (created-at ordering
    /// only). Nothing changed.
    TooOld,
}

impl IngestOutcome {
    /// Label used for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "inserted",
            Self::Duplicate => "duplicate",
            Self::TooOld => "too_old",
        }
    }
}

/// Anything that accepts orders one at a time.
///
/// The live pump and snapshot backfill drive a sink rather than the store
/// directly, so tests can feed synthetic events through the same path.
pub trait OrderSink: Send + Sync {
    fn ingest(&self, order: Order) -> FeedResult<IngestOutcome>;
}

/// Running counters for a feed.
#[derive(Debug, Default)]
pub struct FeedStats {
    inserted: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
    persist_failures: AtomicU64,
}

impl FeedStats {
    fn record_inserted(&self) {
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_evicted(&self, count: usize) {
        self.evicted.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_persist_failure(&self) {
        self.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            inserted: self.inserted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `FeedStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStatsSnapshot {
    pub inserted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub persist_failures: u64,
}

struct FeedState {
    phase: FeedPhase,
    orders: Vec<Order>,
}

/// Bounded, deduplicated, persisted feed of recent orders.
pub struct OrderFeedStore {
    config: FeedConfig,
    store: Arc<dyn KeyValueStore>,
    state: Mutex<FeedState>,
    stats: FeedStats,
}

impl OrderFeedStore {
    /// Create an uninitialized feed backed by `store`.
    pub fn new(config: FeedConfig, store: Arc<dyn KeyValueStore>) -> FeedResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            state: Mutex::new(FeedState {
                phase: FeedPhase::Uninitialized,
                orders: Vec::new(),
            }),
            stats: FeedStats::default(),
        })
    }

    /// Hydrate the feed from the persistent store and mark it ready.
    ///
    /// Never fails: a missing, unreadable or malformed entry yields an empty
    /// feed. Calling it again re-reads the store. Returns the number of
    /// orders adopted.
    pub fn initialize(&self) -> usize {
        let mut state = self.state.lock();
        state.orders = self.load();
        state.phase = FeedPhase::Ready;

        info!(
            key = %self.config.storage_key,
            loaded = state.orders.len(),
            capacity = self.config.capacity,
            "Order feed ready"
        );
        state.orders.len()
    }

    fn load(&self) -> Vec<Order> {
        let key = &self.config.storage_key;
        let text = match self.store.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(%key, "No stored feed, cold start");
                return Vec::new();
            }
            Err(e) => {
                warn!(?e, %key, "Failed to read stored feed, starting empty");
                return Vec::new();
            }
        };

        let mut orders = match FeedCodec::decode(&text) {
            Ok(orders) => orders,
            Err(e) => {
                warn!(%e, %key, "Stored feed is malformed, starting empty");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        orders.retain(|o| seen.insert(o.id.clone()));
        orders.truncate(self.config.capacity);
        orders
    }

    /// Add one order to the feed.
    ///
    /// Idempotent per id: a second copy of an order already in the feed is
    /// ignored and never reorders it. Persist failures are logged and counted
    /// but do not fail the call.
    pub fn ingest(&self, order: Order) -> FeedResult<IngestOutcome> {
        if let Err(e) = order.validate() {
            self.stats.record_rejected();
            warn!(%e, "Rejected order");
            return Err(e.into());
        }

        let mut state = self.state.lock();
        if state.phase != FeedPhase::Ready {
            return Err(FeedError::NotReady);
        }

        if state.orders.iter().any(|o| o.id == order.id) {
            self.stats.record_duplicate();
            debug!(id = %order.id, "Duplicate order ignored");
            return Ok(IngestOutcome::Duplicate);
        }

        let position = insert_position(&state.orders, &order, self.config.ordering);
        if position >= self.config.capacity {
            debug!(id = %order.id, created_at = %order.created_at, "Order older than full feed, ignored");
            return Ok(IngestOutcome::TooOld);
        }

        debug!(id = %order.id, position, "Inserting order");
        state.orders.insert(position, order);
        self.stats.record_inserted();

        let evicted: Vec<OrderId> = if state.orders.len() > self.config.capacity {
            state
                .orders
                .drain(self.config.capacity..)
                .map(|o| o.id)
                .collect()
        } else {
            Vec::new()
        };
        if !evicted.is_empty() {
            self.stats.record_evicted(evicted.len());
            debug!(?evicted, "Evicted orders");
        }

        self.persist(&state.orders);
        Ok(IngestOutcome::Inserted { evicted })
    }

    /// Empty the feed and remove the stored entry.
    ///
    /// Live delivery is unaffected; later events repopulate from empty.
    pub fn clear(&self) -> FeedResult<()> {
        let mut state = self.state.lock();
        if state.phase != FeedPhase::Ready {
            return Err(FeedError::NotReady);
        }

        let cleared = state.orders.len();
        state.orders.clear();

        if let Err(e) = self.store.remove(&self.config.storage_key) {
            self.stats.record_persist_failure();
            warn!(?e, key = %self.config.storage_key, "Failed to remove stored feed");
        }

        info!(cleared, "Order feed cleared");
        Ok(())
    }

    fn persist(&self, orders: &[Order]) {
        let key = &self.config.storage_key;
        let result = FeedCodec::encode(orders).and_then(|text| self.store.set(key, &text));
        if let Err(e) = result {
            self.stats.record_persist_failure();
            warn!(?e, %key, "Failed to persist feed, keeping in-memory state");
        }
    }

    /// Fetch a snapshot once and ingest its orders into this feed.
    pub async fn backfill<S>(&self, source: &S) -> FeedResult<IngestReport>
    where
        S: SnapshotSource + ?Sized,
    {
        backfill(source, self).await
    }

    /// Current feed, newest first. Empty before `initialize`.
    pub fn view(&self) -> Vec<Order> {
        self.state.lock().orders.clone()
    }

    /// Head of the feed.
    pub fn latest(&self) -> Option<Order> {
        self.state.lock().orders.first().cloned()
    }

    pub fn contains(&self, id: &OrderId) -> bool {
        self.state.lock().orders.iter().any(|o| &o.id == id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().orders.is_empty()
    }

    pub fn phase(&self) -> FeedPhase {
        self.state.lock().phase
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn stats(&self) -> FeedStatsSnapshot {
        self.stats.snapshot()
    }
}

impl OrderSink for OrderFeedStore {
    fn ingest(&self, order: Order) -> FeedResult<IngestOutcome> {
        OrderFeedStore::ingest(self, order)
    }
}

/// Index at which `order` belongs under `policy`.
fn insert_position(orders: &[Order], order: &Order, policy: OrderingPolicy) -> usize {
    match policy {
        OrderingPolicy::Arrival => 0,
        OrderingPolicy::CreatedAt => {
            let key = (order.created_at_utc(), &order.id);
            orders
                .iter()
                .position(|existing| key > (existing.created_at_utc(), &existing.id))
                .unwrap_or(orders.len())
        }
    }
}
