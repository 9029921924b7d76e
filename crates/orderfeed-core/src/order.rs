//! Order records and identifiers.
//!
//! An `Order` is the client-side view of one created order. The same order
//! can reach the client from a snapshot read, a live subscription event and
//! the persisted cache; `OrderId` is what ties those copies together.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset and width of the abbreviated id shown in compact listings.
const SHORT_ID_OFFSET: usize = 6;
const SHORT_ID_WIDTH: usize = 5;

/// Opaque order identifier.
///
/// Two orders with the same id are the same order, whatever their other
/// fields say.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Abbreviated form for compact listings.
    pub fn short(&self) -> &str {
        short_id(&self.0)
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Abbreviate a generated identifier to five characters starting at offset 6.
///
/// Identifiers too short to have anything at that offset are returned whole.
pub fn short_id(id: &str) -> &str {
    let Some((start, _)) = id.char_indices().nth(SHORT_ID_OFFSET) else {
        return id;
    };
    let end = id[start..]
        .char_indices()
        .nth(SHORT_ID_WIDTH)
        .map(|(i, _)| start + i)
        .unwrap_or(id.len());
    &id[start..end]
}

/// One created order as observed by the client.
///
/// Field names follow the GraphQL `Order` type (`productId`, `qty`,
/// `createdAt`, `eventId`). Unknown fields are ignored on decode so records
/// written by a newer schema still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub product_id: String,
    #[serde(rename = "qty", alias = "quantity")]
    pub quantity: u32,
    /// Creation timestamp exactly as the source supplied it (RFC 3339).
    pub created_at: String,
    /// Id of the domain event that created the order, if the source sent it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl Order {
    pub fn new(
        id: impl Into<OrderId>,
        product_id: impl Into<String>,
        quantity: u32,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            quantity,
            created_at: created_at.into(),
            event_id: None,
        }
    }

    /// Attach the originating event id.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Check the structural preconditions every feed entry must meet.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_blank() {
            return Err(CoreError::InvalidOrderId(self.id.to_string()));
        }
        if self.quantity == 0 {
            return Err(CoreError::InvalidQuantity {
                id: self.id.to_string(),
                quantity: self.quantity,
            });
        }
        Ok(())
    }

    /// Parsed creation instant, or `None` if `created_at` is not RFC 3339.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
