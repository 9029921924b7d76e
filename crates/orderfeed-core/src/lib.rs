//! Core domain types for the recent-orders feed.
//!
//! This crate provides the record types shared by every other crate:
//! - `Order`: one created order as observed by the client
//! - `OrderId`: opaque identifier, stable across snapshot, live and stored copies
//! - `short_id`: abbreviated identifier used in compact listings

pub mod error;
pub mod order;

pub use error::{CoreError, Result};
pub use order::{short_id, Order, OrderId};
