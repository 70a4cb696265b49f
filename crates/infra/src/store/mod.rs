//! Persistence ports and their adapters.
//!
//! One trait per entity. Uniqueness (item name per owner, category name) and
//! the no-overlap rule for confirmed reservations are enforced by the store
//! itself, so a racing writer gets [`StoreError::Duplicate`] or
//! [`StoreError::Conflict`] even when the service-level check passed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use labdesk_core::{CategoryId, ItemId, ReservationId, UserId};
use labdesk_inventory::{Category, InventoryItem, ItemFilter};
use labdesk_reservations::Reservation;

use crate::query::ReservationQuery;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    /// A uniqueness rule was violated (duplicate name).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A confirmed reservation already holds an overlapping slot.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Record the user if unseen. Items and reservations reference it.
    async fn ensure_user(&self, user: UserId) -> Result<(), StoreError>;

    /// Remove the user with all their items and reservations.
    async fn delete_user(&self, user: UserId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    /// All categories ordered by name.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Items that referenced the category keep existing with no category.
    async fn delete_category(&self, id: CategoryId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError>;

    async fn update_item(&self, item: &InventoryItem) -> Result<(), StoreError>;

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError>;

    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError>;

    /// The owner's items, filtered and ordered as [`ItemFilter::apply`] does.
    async fn list_items(
        &self,
        owner: UserId,
        filter: &ItemFilter,
    ) -> Result<Vec<InventoryItem>, StoreError>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn insert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn update_reservation(&self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    async fn delete_reservation(&self, id: ReservationId) -> Result<bool, StoreError>;

    /// Confirmed reservations overlapping `[start, end)`, for one room or all rooms.
    async fn confirmed_overlapping(
        &self,
        room_key: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Confirmed reservations of a room starting at or after `now`, earliest first.
    async fn upcoming_for_room(
        &self,
        room_key: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn count_for_owner(
        &self,
        owner: UserId,
        query: &ReservationQuery,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// One page of the owner's reservations, latest start first.
    async fn list_for_owner(
        &self,
        owner: UserId,
        query: &ReservationQuery,
        now: DateTime<Utc>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Reservation>, StoreError>;

    /// Every reservation of the owner that still references a calendar event.
    async fn with_events_for_owner(&self, owner: UserId) -> Result<Vec<Reservation>, StoreError>;
}
