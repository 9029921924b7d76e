//! Main application orchestration.
//!
//! Coordinates:
//! - Feed hydration from the persistent store
//! - Optional snapshot backfill
//! - Live payload parsing and ingestion through `LivePump`
//! - Metrics for every ingest

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use chrono::Local;
use orderfeed_core::{short_id, Order};
use orderfeed_feed::{
    backfill, FeedResult, IngestOutcome, IngestReport, JsonFileSnapshot, LiveEventParser,
    LivePump, OrderFeedStore, OrderSink,
};
use orderfeed_persistence::KeyValueStore;
use orderfeed_telemetry::Metrics;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Buffered live orders between the reader and the pump.
const LIVE_CHANNEL_CAPACITY: usize = 256;

/// Sink that records metrics around each feed ingest.
struct MeteredSink {
    feed: Arc<OrderFeedStore>,
    source: &'static str,
}

impl OrderSink for MeteredSink {
    fn ingest(&self, order: Order) -> FeedResult<IngestOutcome> {
        let offered = order.clone();
        let started = Instant::now();
        let result = self.feed.ingest(order);
        let latency_us = started.elapsed().as_micros() as f64;

        match &result {
            Ok(outcome) => {
                Metrics::ingest(self.source, outcome.label(), latency_us);
                if let IngestOutcome::Inserted { evicted } = outcome {
                    Metrics::evicted(evicted.len());
                    info!(
                        source = self.source,
                        order = offered.id.short(),
                        product = short_id(&offered.product_id),
                        qty = offered.quantity,
                        created_at = %offered.created_at,
                        evicted = evicted.len(),
                        feed_len = self.feed.len(),
                        "Order inserted"
                    );
                }
            }
            Err(_) => Metrics::ingest(self.source, "rejected", latency_us),
        }

        Metrics::feed_length(self.feed.len());
        Metrics::persist_failures(self.feed.stats().persist_failures);
        result
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    feed: Arc<OrderFeedStore>,
    parser: LiveEventParser,
}

impl Application {
    /// Create an application using the configured store.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store = config.storage.open();
        Self::with_store(config, store)
    }

    /// Create an application over an explicit store.
    pub fn with_store(config: AppConfig, store: Arc<dyn KeyValueStore>) -> AppResult<Self> {
        config.validate()?;
        let feed = Arc::new(OrderFeedStore::new(config.feed.clone(), store)?);
        Ok(Self {
            config,
            feed,
            parser: LiveEventParser::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn feed(&self) -> &Arc<OrderFeedStore> {
        &self.feed
    }

    /// Hydrate the feed. Returns the number of orders restored.
    pub fn start(&self) -> usize {
        let restored = self.feed.initialize();
        Metrics::feed_length(restored);
        info!(
            restored,
            capacity = self.feed.capacity(),
            ordering = ?self.config.feed.ordering,
            "Application started"
        );
        restored
    }

    /// Backfill the feed from a snapshot file.
    pub async fn backfill_from_file(&self, path: &Path) -> AppResult<IngestReport> {
        info!(path = %path.display(), "Backfilling from snapshot");
        let snapshot = JsonFileSnapshot::new(path);
        let sink = MeteredSink {
            feed: self.feed.clone(),
            source: "snapshot",
        };
        Ok(backfill(&snapshot, &sink).await?)
    }

    /// Consume live payloads, one JSON document per line, until the input
    /// ends or Ctrl-C.
    ///
    /// Lines that are not valid UTF-8 are counted as failed payloads and
    /// skipped. Any other read error stops the loop; orders already queued
    /// are still ingested before the error is returned.
    pub async fn run<R>(&self, input: R) -> AppResult<IngestReport>
    where
        R: AsyncBufRead + Unpin,
    {
        let (order_tx, order_rx) = mpsc::channel::<Order>(LIVE_CHANNEL_CAPACITY);
        let sink = Arc::new(MeteredSink {
            feed: self.feed.clone(),
            source: "live",
        });
        let pump = LivePump::new(sink).spawn(order_rx);

        info!("Entering live event loop");
        let mut lines = input.lines();
        let mut read_error = None;
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            info!("Live input closed");
                            break;
                        }
                        Err(e) if e.kind() == ErrorKind::InvalidData => {
                            Metrics::live_payload("failed");
                            warn!(%e, "Skipping undecodable live line");
                            continue;
                        }
                        Err(e) => {
                            warn!(%e, "Live input read failed");
                            read_error = Some(e);
                            break;
                        }
                    };
                    match self.parser.parse(&line) {
                        Ok(Some(order)) => {
                            Metrics::live_payload("parsed");
                            if order_tx.send(order).await.is_err() {
                                warn!("Live pump stopped, dropping input");
                                break;
                            }
                        }
                        Ok(None) => Metrics::live_payload("ignored"),
                        Err(_) => Metrics::live_payload("failed"),
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        drop(order_tx);
        let report = pump.await.map_err(|e| AppError::Task(e.to_string()))?;
        if let Some(e) = read_error {
            return Err(e.into());
        }

        let stats = self.feed.stats();
        info!(
            received = report.received,
            inserted = report.inserted,
            duplicates = report.duplicates,
            rejected = report.rejected,
            evicted = stats.evicted,
            persist_failures = stats.persist_failures,
            "Shutting down"
        );
        Ok(report)
    }

    /// Empty the feed and its stored copy.
    pub fn clear(&self) -> AppResult<()> {
        self.feed.clear()?;
        Metrics::feed_length(0);
        Ok(())
    }

    /// Current feed as a printable listing.
    pub fn render(&self) -> String {
        render_feed(&self.feed.view())
    }
}

/// Format a feed listing: short id, short product id, qty, local time.
pub fn render_feed(orders: &[Order]) -> String {
    let mut out = String::from("Last Orders\n");
    if orders.is_empty() {
        out.push_str("(none)\n");
        return out;
    }

    for order in orders {
        let created = order
            .created_at_utc()
            .map(|ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| order.created_at.clone());
        let _ = writeln!(
            out,
            "{:<6} {:<6} {:>4}  {}",
            order.id.short(),
            short_id(&order.product_id),
            order.quantity,
            created
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use orderfeed_persistence::MemoryStore;

    fn memory_config(capacity: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.feed.capacity = capacity;
        config.storage.backend = StorageBackend::Memory;
        config
    }

    #[test]
    fn test_render_empty_feed() {
        assert_eq!(render_feed(&[]), "Last Orders\n(none)\n");
    }

    #[test]
    fn test_render_uses_short_ids() {
        let orders = vec![Order::new("6650f1a2b3c4d5", "prod-0042aa", 3, "t1")];
        let out = render_feed(&orders);
        let line = out.lines().nth(1).unwrap();
        assert!(line.starts_with("a2b3c "));
        assert!(line.contains("042aa"));
        assert!(line.ends_with("   3  t1"));
    }

    #[tokio::test]
    async fn test_run_ingests_lines_until_eof() {
        let app = Application::new(memory_config(3)).unwrap();
        app.start();

        let input = [
            r#"{"data":{"lastOrderCreated":{"id":"1","productId":"p1","qty":2,"createdAt":"t1"}}}"#,
            r#"{"type":"ka"}"#,
            r#"{"lastOrderCreated":{"id":"2","productId":"p2","qty":1,"createdAt":"t2"}}"#,
            r#"{"data":{"lastOrderCreated":{"id":"1","productId":"p1","qty":2,"createdAt":"t1"}}}"#,
            "{not json",
            r#"{"id":"3","productId":"p3","qty":1,"createdAt":"t3"}"#,
            r#"{"id":"4","productId":"p4","qty":1,"createdAt":"t4"}"#,
        ]
        .join("\n");

        let report = app.run(input.as_bytes()).await.unwrap();
        assert_eq!(report.received, 5);
        assert_eq!(report.inserted, 4);
        assert_eq!(report.duplicates, 1);

        let ids: Vec<_> = app.feed().view().into_iter().map(|o| o.id.to_string()).collect();
        assert_eq!(ids, vec!["4", "3", "2"]);
        assert_eq!(app.parser.stats().failed(), 1);
        assert_eq!(app.parser.stats().ignored(), 1);
    }

    #[tokio::test]
    async fn test_run_skips_undecodable_line() {
        let app = Application::new(memory_config(3)).unwrap();
        app.start();

        let mut input = Vec::new();
        input.extend_from_slice(br#"{"id":"a","productId":"p1","qty":1,"createdAt":"t1"}"#);
        input.extend_from_slice(b"\n\xff\xfe\n");
        input.extend_from_slice(br#"{"id":"b","productId":"p2","qty":1,"createdAt":"t2"}"#);

        let report = app.run(input.as_slice()).await.unwrap();
        assert_eq!(report.inserted, 2);
        let ids: Vec<_> = app.feed().view().into_iter().map(|o| o.id.to_string()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_insert_log_names_the_ingested_order() {
        let mut config = memory_config(3);
        config.feed.ordering = orderfeed_feed::OrderingPolicy::CreatedAt;
        let app = Application::new(config).unwrap();
        app.start();
        let sink = MeteredSink {
            feed: app.feed().clone(),
            source: "live",
        };
        sink.ingest(Order::new("newest", "p1", 1, "2025-01-01T00:00:09Z"))
            .unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let outcome = tracing::subscriber::with_default(subscriber, || {
            sink.ingest(Order::new("older", "p2", 1, "2025-01-01T00:00:01Z"))
        })
        .unwrap();

        assert!(matches!(outcome, IngestOutcome::Inserted { .. }));
        assert_eq!(app.feed().latest().unwrap().id.as_str(), "newest");

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("Order inserted"));
        assert!(text.contains("2025-01-01T00:00:01Z"));
        assert!(!text.contains("2025-01-01T00:00:09Z"));
    }

    #[tokio::test]
    async fn test_clear() {
        let store = Arc::new(MemoryStore::new());
        let app = Application::with_store(memory_config(3), store.clone()).unwrap();
        app.start();
        app.run(r#"{"id":"1","productId":"p1","qty":1,"createdAt":"t1"}"#.as_bytes())
            .await
            .unwrap();
        assert!(store.get("orders").unwrap().is_some());

        app.clear().unwrap();
        assert!(app.feed().is_empty());
        assert!(store.get("orders").unwrap().is_none());
    }

    #[test]
    fn test_clear_before_start_fails() {
        let app = Application::new(memory_config(3)).unwrap();
        assert!(matches!(app.clear(), Err(AppError::Feed(_))));
    }
}
