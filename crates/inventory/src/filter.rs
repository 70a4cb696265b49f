//! Read-side filtering for the inventory dashboard.
//!
//! Stores that can push filtering down (SQL) do so; these functions define the
//! reference semantics and back the in-memory store.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use labdesk_core::{CategoryId, DomainError, ItemId};

use crate::item::InventoryItem;

/// Items at or below this quantity are flagged as low stock unless configured otherwise.
pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 3;

/// Maximum number of names returned by the search-suggestion endpoint.
pub const SUGGESTION_LIMIT: usize = 5;

/// Ordering applied to an item listing.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantitySort {
    /// Creation order (oldest first).
    #[default]
    Insertion,
    LowToHigh,
    HighToLow,
}

impl FromStr for QuantitySort {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "insertion" => Ok(Self::Insertion),
            "low_to_high" => Ok(Self::LowToHigh),
            "high_to_low" => Ok(Self::HighToLow),
            other => Err(DomainError::validation(format!(
                "unknown sort '{other}' (expected low_to_high or high_to_low)"
            ))),
        }
    }
}

/// Dashboard filter: text search, category and quantity ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    /// Case-insensitive substring match on the item name.
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    pub sort: QuantitySort,
}

impl ItemFilter {
    /// Normalized search needle (`None` for blank input).
    pub fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, item: &InventoryItem) -> bool {
        if let Some(category) = self.category {
            if item.category != Some(category) {
                return false;
            }
        }
        match self.needle() {
            Some(needle) => item.name.to_lowercase().contains(&needle),
            None => true,
        }
    }

    /// Filter and order `items`.
    ///
    /// Insertion order is id order (ids are time-ordered); quantity sorts break
    /// ties the same way so results are deterministic.
    pub fn apply(&self, items: impl IntoIterator<Item = InventoryItem>) -> Vec<InventoryItem> {
        let mut out: Vec<InventoryItem> = items.into_iter().filter(|i| self.matches(i)).collect();
        match self.sort {
            QuantitySort::Insertion => out.sort_by_key(|i| i.id),
            QuantitySort::LowToHigh => out.sort_by_key(|i| (i.quantity, i.id)),
            QuantitySort::HighToLow => {
                out.sort_by(|a, b| b.quantity.cmp(&a.quantity).then(a.id.cmp(&b.id)))
            }
        }
        out
    }
}

/// Names of items containing `text` (case-insensitive), capped at [`SUGGESTION_LIMIT`].
pub fn suggestions<'a>(items: impl IntoIterator<Item = &'a InventoryItem>, text: &str) -> Vec<String> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut matched: Vec<&InventoryItem> = items
        .into_iter()
        .filter(|i| i.name.to_lowercase().contains(&needle))
        .collect();
    matched.sort_by_key(|i| i.id);
    matched
        .into_iter()
        .take(SUGGESTION_LIMIT)
        .map(|i| i.name.clone())
        .collect()
}

/// Low-stock banner shown alongside the item listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockSummary {
    pub threshold: u32,
    pub item_ids: Vec<ItemId>,
    pub message: Option<String>,
}

impl LowStockSummary {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a InventoryItem>, threshold: u32) -> Self {
        let mut item_ids: Vec<ItemId> = items
            .into_iter()
            .filter(|i| i.is_low_stock(threshold))
            .map(|i| i.id)
            .collect();
        item_ids.sort();

        let message = match item_ids.len() {
            0 => None,
            1 => Some("1 item has low inventory".to_string()),
            n => Some(format!("{n} items have low inventory")),
        };

        Self {
            threshold,
            item_ids,
            message,
        }
    }

    pub fn count(&self) -> usize {
        self.item_ids.len()
    }
}
