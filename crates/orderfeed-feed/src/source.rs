//! Snapshot and live order sources.
//!
//! A snapshot source answers once with the orders it currently knows. The
//! live side is any stream of orders; `LivePump` drains it into an
//! `OrderSink` until the stream ends. Reconnects and redelivery belong to
//! whoever produces the stream; the sink's dedup absorbs repeats.

use crate::error::{FeedError, FeedResult};
use crate::feed_store::{IngestOutcome, OrderSink};
use futures_util::{pin_mut, Stream, StreamExt};
use orderfeed_core::Order;
use serde_json::Value;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Boxed future returned by source traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One element of a snapshot: a decoded order, or why it could not be decoded.
pub type SnapshotEntry = FeedResult<Order>;

/// One-shot read of known orders, newest first.
///
/// A failed fetch fails the whole read; a malformed element is returned as an
/// `Err` entry so the rest of the snapshot can still be used.
pub trait SnapshotSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<SnapshotEntry>>>;
}

/// Snapshot with a fixed list of orders.
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    orders: Vec<Order>,
}

impl StaticSnapshot {
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }
}

impl SnapshotSource for StaticSnapshot {
    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<SnapshotEntry>>> {
        Box::pin(async move { Ok(self.orders.iter().cloned().map(Ok).collect()) })
    }
}

/// Snapshot read from a JSON file.
///
/// Accepts a bare array of orders or a GraphQL response of the form
/// `{"data": {"orders": [...]}}`.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parse(text: &str) -> FeedResult<Vec<SnapshotEntry>> {
        let value: Value = serde_json::from_str(text)?;
        let list = match value {
            Value::Array(list) => list,
            Value::Object(ref body) => {
                let orders = body
                    .get("data")
                    .unwrap_or(&value)
                    .get("orders")
                    .cloned();
                match orders {
                    Some(Value::Array(list)) => list,
                    _ => {
                        return Err(FeedError::Source(
                            "snapshot has no orders array".to_string(),
                        ))
                    }
                }
            }
            _ => {
                return Err(FeedError::Source(
                    "snapshot is neither an array nor an object".to_string(),
                ))
            }
        };

        Ok(list
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                serde_json::from_value::<Order>(element).map_err(|e| {
                    FeedError::ParseError(format!("snapshot element {index}: {e}"))
                })
            })
            .collect())
    }
}

impl SnapshotSource for JsonFileSnapshot {
    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<SnapshotEntry>>> {
        Box::pin(async move {
            let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
                FeedError::Source(format!("failed to read {}: {e}", self.path.display()))
            })?;
            let orders = Self::parse(&text)?;
            debug!(path = %self.path.display(), count = orders.len(), "Snapshot loaded");
            Ok(orders)
        })
    }
}

/// Tally of ingest results over a batch or a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub too_old: u64,
    pub rejected: u64,
}

impl IngestReport {
    pub fn record(&mut self, result: &FeedResult<IngestOutcome>) {
        self.received += 1;
        match result {
            Ok(IngestOutcome::Inserted { .. }) => self.inserted += 1,
            Ok(IngestOutcome::Duplicate) => self.duplicates += 1,
            Ok(IngestOutcome::TooOld) => self.too_old += 1,
            Err(e) => {
                warn!(%e, "Order not ingested");
                self.rejected += 1;
            }
        }
    }
}

/// Fetch a snapshot once and ingest its orders into `sink`.
///
/// Snapshot lists are newest-first, so they are ingested oldest-first to
/// leave the newest order at the head under arrival ordering. Malformed and
/// invalid elements are counted as rejected and skipped; an uninitialized
/// sink aborts the batch.
pub async fn backfill<S, K>(source: &S, sink: &K) -> FeedResult<IngestReport>
where
    S: SnapshotSource + ?Sized,
    K: OrderSink + ?Sized,
{
    let entries = source.fetch().await?;
    let mut report = IngestReport::default();

    for entry in entries.into_iter().rev() {
        let result = entry.and_then(|order| sink.ingest(order));
        if matches!(result, Err(FeedError::NotReady)) {
            return Err(FeedError::NotReady);
        }
        report.record(&result);
    }

    info!(
        received = report.received,
        inserted = report.inserted,
        duplicates = report.duplicates,
        rejected = report.rejected,
        "Snapshot backfill complete"
    );
    Ok(report)
}

/// Drains a live order stream into a sink.
pub struct LivePump<S: OrderSink + ?Sized> {
    sink: Arc<S>,
}

impl<S: OrderSink + ?Sized + 'static> LivePump<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink }
    }

    /// Ingest every order from `stream` until it ends.
    ///
    /// Per-event failures are logged and counted; they never stop the pump.
    pub async fn run<St>(&self, stream: St) -> IngestReport
    where
        St: Stream<Item = Order>,
    {
        pin_mut!(stream);
        let mut report = IngestReport::default();

        while let Some(order) = stream.next().await {
            let id = order.id.clone();
            let result = self.sink.ingest(order);
            if let Ok(outcome) = &result {
                debug!(%id, outcome = outcome.label(), "Live order");
            }
            report.record(&result);
        }

        info!(
            received = report.received,
            inserted = report.inserted,
            duplicates = report.duplicates,
            "Live stream ended"
        );
        report
    }

    /// Spawn a task pumping orders from a channel until all senders drop.
    pub fn spawn(self, rx: mpsc::Receiver<Order>) -> JoinHandle<IngestReport> {
        tokio::spawn(async move {
            let stream = futures_util::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|order| (order, rx))
            });
            self.run(stream).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::feed_store::OrderFeedStore;
    use orderfeed_persistence::MemoryStore;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn order(id: &str) -> Order {
        Order::new(id, "p1", 1, "2025-01-01T00:00:00Z")
    }

    fn ready_feed(capacity: usize) -> Arc<OrderFeedStore> {
        let feed = OrderFeedStore::new(
            FeedConfig::with_capacity(capacity),
            Arc::new(MemoryStore::new()),
        )
        .unwrap();
        feed.initialize();
        Arc::new(feed)
    }

    #[test]
    fn test_parse_bare_array() {
        let orders = JsonFileSnapshot::parse(
            r#"[{"id":"1","productId":"p1","qty":1,"createdAt":"t1"}]"#,
        )
        .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].as_ref().unwrap(), &Order::new("1", "p1", 1, "t1"));
    }

    #[test]
    fn test_parse_graphql_envelope() {
        let orders = JsonFileSnapshot::parse(
            r#"{"data":{"orders":[
                {"id":"2","productId":"p2","qty":3,"createdAt":"t2","__typename":"Order"},
                {"id":"1","productId":"p1","qty":1,"createdAt":"t1"}
            ]}}"#,
        )
        .unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].as_ref().unwrap().quantity, 3);
    }

    #[test]
    fn test_parse_keeps_going_past_malformed_elements() {
        let entries = JsonFileSnapshot::parse(
            r#"[
                {"id":"s2","productId":"p","qty":1,"createdAt":"t2"},
                {"productId":"p","qty":1,"createdAt":"t"},
                {"id":"neg","productId":"p","qty":-1,"createdAt":"t"},
                {"id":"s1","productId":"p","qty":1,"createdAt":"t1"}
            ]"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries[0].is_ok());
        assert!(matches!(entries[1], Err(FeedError::ParseError(_))));
        assert!(matches!(entries[2], Err(FeedError::ParseError(_))));
        assert!(entries[3].is_ok());
    }

    #[test]
    fn test_parse_without_orders_fails() {
        assert!(matches!(
            JsonFileSnapshot::parse(r#"{"data":{"products":[]}}"#),
            Err(FeedError::Source(_))
        ));
        assert!(matches!(
            JsonFileSnapshot::parse(r#"{"data":{"orders":{}}}"#),
            Err(FeedError::Source(_))
        ));
        assert!(matches!(
            JsonFileSnapshot::parse("42"),
            Err(FeedError::Source(_))
        ));
        assert!(JsonFileSnapshot::parse("{not json").is_err());
    }

    #[tokio::test]
    async fn test_file_snapshot_fetch() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id":"1","productId":"p1","qty":1,"createdAt":"t1"}}]"#
        )
        .unwrap();

        let snapshot = JsonFileSnapshot::new(file.path());
        let orders = snapshot.fetch().await.unwrap();
        assert_eq!(orders.len(), 1);
    }

    #[tokio::test]
    async fn test_file_snapshot_missing_file() {
        let snapshot = JsonFileSnapshot::new("/nonexistent/orders.json");
        assert!(matches!(snapshot.fetch().await, Err(FeedError::Source(_))));
    }

    #[tokio::test]
    async fn test_backfill_skips_malformed_snapshot_elements() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"data":{{"orders":[
                {{"id":"s2","productId":"p","qty":1,"createdAt":"t2"}},
                {{"productId":"p","qty":1,"createdAt":"t"}},
                {{"id":"s1","productId":"p","qty":1,"createdAt":"t1"}}
            ]}}}}"#
        )
        .unwrap();

        let feed = ready_feed(3);
        let report = backfill(&JsonFileSnapshot::new(file.path()), feed.as_ref())
            .await
            .unwrap();

        assert_eq!(report.received, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.rejected, 1);
        let ids: Vec<_> = feed.view().into_iter().map(|o| o.id.to_string()).collect();
        assert_eq!(ids, vec!["s2", "s1"]);
    }

    #[tokio::test]
    async fn test_pump_drains_stream() {
        let feed = ready_feed(3);
        let pump = LivePump::new(feed.clone());

        let events = futures_util::stream::iter(vec![
            order("1"),
            order("2"),
            order("1"),
            Order::new("", "p", 1, "t"),
            order("3"),
            order("4"),
        ]);
        let report = pump.run(events).await;

        assert_eq!(report.received, 6);
        assert_eq!(report.inserted, 4);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.rejected, 1);

        let ids: Vec<_> = feed.view().into_iter().map(|o| o.id.to_string()).collect();
        assert_eq!(ids, vec!["4", "3", "2"]);
    }

    #[tokio::test]
    async fn test_spawned_pump_ends_when_senders_drop() {
        let feed = ready_feed(7);
        let (tx, rx) = mpsc::channel(16);
        let handle = LivePump::new(feed.clone()).spawn(rx);

        tx.send(order("a")).await.unwrap();
        tx.send(order("b")).await.unwrap();
        tx.send(order("a")).await.unwrap();
        drop(tx);

        let report = handle.await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(feed.len(), 2);
    }
}
