//! JSON codec for the persisted feed.
//!
//! The feed is stored as a JSON array of order objects, newest first.
//! Decoding is strict about shape (must be an array, every element must carry
//! the required order fields and pass validation) and lenient about extra
//! fields, which are dropped.

use crate::error::{PersistenceError, PersistenceResult};
use orderfeed_core::Order;

/// Encoder/decoder for the stored feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedCodec;

impl FeedCodec {
    pub fn encode(orders: &[Order]) -> PersistenceResult<String> {
        Ok(serde_json::to_string(orders)?)
    }

    pub fn decode(text: &str) -> PersistenceResult<Vec<Order>> {
        let orders: Vec<Order> = serde_json::from_str(text)?;
        for (index, order) in orders.iter().enumerate() {
            order
                .validate()
                .map_err(|source| PersistenceError::InvalidRecord { index, source })?;
        }
        Ok(orders)
    }
}
