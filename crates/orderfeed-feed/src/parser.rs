//! Parsing of live subscription payloads.
//!
//! The `lastOrderCreated` subscription reaches the client in a few shapes
//! depending on how far the transport has unwrapped it:
//! 1. graphql-ws frame: `{"type":"next","id":"1","payload":{"data":{"lastOrderCreated":{..}}}}`
//! 2. GraphQL response: `{"data":{"lastOrderCreated":{..}}}`
//! 3. Field only: `{"lastOrderCreated":{..}}`
//! 4. Bare order object: `{"id":..,"productId":..,"qty":..,"createdAt":..}`
//!
//! Protocol control frames (`connection_ack`, `ka`, `complete`, ...) and
//! empty payloads (`"lastOrderCreated": null`) produce no event. `error`
//! frames and responses with `errors` but no data are parse failures.

use crate::error::{FeedError, FeedResult};
use orderfeed_core::Order;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Subscription field carrying the created order.
pub const LAST_ORDER_CREATED: &str = "lastOrderCreated";

/// Frame types that carry subscription data.
const DATA_FRAME_TYPES: &[&str] = &["next", "data"];

/// Frame type reporting a failed subscription operation.
const ERROR_FRAME_TYPE: &str = "error";

/// Counters for parsed payloads.
#[derive(Debug, Default)]
pub struct ParserStats {
    parsed: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

impl ParserStats {
    fn record_parsed(&self) {
        self.parsed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parsed(&self) -> u64 {
        self.parsed.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Parser for live order events.
#[derive(Debug, Default)]
pub struct LiveEventParser {
    stats: ParserStats,
}

impl LiveEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ParserStats {
        &self.stats
    }

    /// Parse one payload. `Ok(None)` means the payload carries no order.
    pub fn parse(&self, raw: &str) -> FeedResult<Option<Order>> {
        let result = self.parse_inner(raw);
        match &result {
            Ok(Some(order)) => {
                self.stats.record_parsed();
                debug!(id = %order.id, "Parsed live order");
            }
            Ok(None) => self.stats.record_ignored(),
            Err(e) => {
                self.stats.record_failed();
                warn!(%e, "Failed to parse live payload");
            }
        }
        result
    }

    fn parse_inner(&self, raw: &str) -> FeedResult<Option<Order>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(FeedError::ParseError(format!(
                "expected a JSON object, got {value}"
            )));
        }

        let mut node = &value;

        if let Some(kind) = node.get("type").and_then(Value::as_str) {
            if kind == ERROR_FRAME_TYPE {
                let detail = node
                    .get("payload")
                    .map(Value::to_string)
                    .unwrap_or_default();
                return Err(FeedError::ParseError(format!(
                    "subscription error frame: {detail}"
                )));
            }
            if !DATA_FRAME_TYPES.contains(&kind) {
                debug!(frame = kind, "Control frame ignored");
                return Ok(None);
            }
            match node.get("payload") {
                Some(payload) => node = payload,
                None => return Ok(None),
            }
        }

        if let Some(errors) = node.get("errors") {
            if node.get("data").map_or(true, Value::is_null) {
                return Err(FeedError::ParseError(format!(
                    "subscription returned errors: {errors}"
                )));
            }
        }

        if let Some(data) = node.get("data") {
            node = data;
        }
        if let Some(field) = node.get(LAST_ORDER_CREATED) {
            node = field;
        }

        if node.is_null() {
            return Ok(None);
        }

        let order = Order::deserialize(node)
            .map_err(|e| FeedError::ParseError(format!("invalid order: {e}")))?;
        Ok(Some(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &str =
        r#"{"id":"6650f1a2b3c4","productId":"p1","qty":2,"createdAt":"2025-01-01T00:00:00Z"}"#;

    fn expected() -> Order {
        Order::new("6650f1a2b3c4", "p1", 2, "2025-01-01T00:00:00Z")
    }

    #[test]
    fn test_parse_bare_order() {
        let parser = LiveEventParser::new();
        assert_eq!(parser.parse(ORDER).unwrap(), Some(expected()));
        assert_eq!(parser.stats().parsed(), 1);
    }

    #[test]
    fn test_parse_graphql_envelope() {
        let parser = LiveEventParser::new();
        let raw = format!(r#"{{"data":{{"lastOrderCreated":{ORDER}}}}}"#);
        assert_eq!(parser.parse(&raw).unwrap(), Some(expected()));
    }

    #[test]
    fn test_parse_field_only() {
        let parser = LiveEventParser::new();
        let raw = format!(r#"{{"lastOrderCreated":{ORDER}}}"#);
        assert_eq!(parser.parse(&raw).unwrap(), Some(expected()));
    }

    #[test]
    fn test_parse_graphql_ws_frame() {
        let parser = LiveEventParser::new();
        let raw = format!(
            r#"{{"type":"next","id":"1","payload":{{"data":{{"lastOrderCreated":{ORDER}}}}}}}"#
        );
        assert_eq!(parser.parse(&raw).unwrap(), Some(expected()));
    }

    #[test]
    fn test_control_frames_and_empty_payloads_ignored() {
        let parser = LiveEventParser::new();
        for raw in [
            "",
            "   ",
            r#"{"type":"connection_ack"}"#,
            r#"{"type":"ka"}"#,
            r#"{"type":"complete","id":"1"}"#,
            r#"{"data":{"lastOrderCreated":null}}"#,
        ] {
            assert_eq!(parser.parse(raw).unwrap(), None, "payload {raw:?}");
        }
        assert_eq!(parser.stats().ignored(), 6);
    }

    #[test]
    fn test_subscription_errors_reported() {
        let parser = LiveEventParser::new();
        let raw = r#"{"errors":[{"message":"boom"}],"data":null}"#;
        assert!(matches!(parser.parse(raw), Err(FeedError::ParseError(_))));
        assert_eq!(parser.stats().failed(), 1);
    }

    #[test]
    fn test_error_frame_reported() {
        let parser = LiveEventParser::new();
        let raw = r#"{"type":"error","id":"1","payload":[{"message":"unauthorized"}]}"#;
        match parser.parse(raw) {
            Err(FeedError::ParseError(msg)) => assert!(msg.contains("unauthorized")),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert_eq!(parser.stats().failed(), 1);
        assert_eq!(parser.stats().ignored(), 0);
    }

    #[test]
    fn test_malformed_payloads_fail() {
        let parser = LiveEventParser::new();
        assert!(matches!(parser.parse("{not json"), Err(FeedError::Json(_))));
        assert!(parser.parse("[1,2]").is_err());
        assert!(parser
            .parse(r#"{"data":{"lastOrderCreated":{"id":"1"}}}"#)
            .is_err());
    }

    #[test]
    fn test_extra_fields_ignored() {
        let parser = LiveEventParser::new();
        let raw = r#"{"lastOrderCreated":{"__typename":"Order","id":"9","productId":"p","qty":1,"createdAt":"t","eventId":"e9","price":100}}"#;
        let order = parser.parse(raw).unwrap().unwrap();
        assert_eq!(order.event_id.as_deref(), Some("e9"));
    }
}
