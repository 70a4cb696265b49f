//! Inventory domain module.
//!
//! This crate contains business rules for inventory items and categories,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod category;
pub mod filter;
pub mod item;

pub use category::{Category, CreateCategory};
pub use filter::{
    DEFAULT_LOW_STOCK_THRESHOLD, ItemFilter, LowStockSummary, QuantitySort, SUGGESTION_LIMIT,
    suggestions,
};
pub use item::{CreateItem, InventoryItem, Quantity, UpdateItem, ensure_name_available};
