use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use labdesk_core::{CategoryId, Entity, ItemId, ReservationId, UserId};
use labdesk_inventory::{Category, InventoryItem, ItemFilter};
use labdesk_reservations::{Reservation, find_conflict};

use super::{CategoryStore, ItemStore, ReservationStore, StoreError, UserStore};
use crate::query::ReservationQuery;

/// Insert or replace a record under its entity id.
fn put<E: Entity + Clone>(table: &mut HashMap<E::Id, E>, record: &E) {
    table.insert(record.id(), record.clone());
}

#[derive(Debug, Default)]
struct Tables {
    users: HashSet<UserId>,
    categories: HashMap<CategoryId, Category>,
    items: HashMap<ItemId, InventoryItem>,
    reservations: HashMap<ReservationId, Reservation>,
}

impl Tables {
    fn check_item_name(&self, item: &InventoryItem) -> Result<(), StoreError> {
        let taken = self
            .items
            .values()
            .any(|i| i.id != item.id && i.owner == item.owner && i.name == item.name);
        if taken {
            return Err(StoreError::Duplicate(format!(
                "an item named '{}' already exists",
                item.name
            )));
        }
        Ok(())
    }

    fn check_overlap(&self, reservation: &Reservation) -> Result<(), StoreError> {
        if !reservation.is_confirmed() {
            return Ok(());
        }
        match find_conflict(
            self.reservations.values(),
            &reservation.room_key,
            &reservation.slot,
            Some(reservation.id),
        ) {
            Some(existing) => Err(StoreError::Conflict(format!(
                "overlaps confirmed reservation {}",
                existing.id
            ))),
            None => Ok(()),
        }
    }
}

/// In-memory store for tests/dev, implementing every store trait.
///
/// All tables sit behind one lock, so check-and-write sequences (uniqueness,
/// reservation overlap, cascading user deletes) are atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn ensure_user(&self, user: UserId) -> Result<(), StoreError> {
        self.write()?.users.insert(user);
        Ok(())
    }

    async fn delete_user(&self, user: UserId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        let known = t.users.remove(&user);
        let items_before = t.items.len();
        let reservations_before = t.reservations.len();
        t.items.retain(|_, i| i.owner != user);
        t.reservations.retain(|_, r| r.owner != user);
        Ok(known || t.items.len() != items_before || t.reservations.len() != reservations_before)
    }
}

#[async_trait]
impl CategoryStore for InMemoryStore {
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if t.categories.values().any(|c| c.name == category.name) {
            return Err(StoreError::Duplicate(format!(
                "category '{}' already exists",
                category.name
            )));
        }
        put(&mut t.categories, category);
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut out: Vec<Category> = self.read()?.categories.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, StoreError> {
        let mut t = self.write()?;
        if t.categories.remove(&id).is_none() {
            return Ok(false);
        }
        for item in t.items.values_mut() {
            if item.category == Some(id) {
                item.category = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        let mut t = self.write()?;
        t.check_item_name(item)?;
        put(&mut t.items, item);
        Ok(())
    }

    async fn update_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if !t.items.contains_key(&item.id) {
            return Err(StoreError::NotFound);
        }
        t.check_item_name(item)?;
        put(&mut t.items, item);
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
        Ok(self.write()?.items.remove(&id).is_some())
    }

    async fn list_items(
        &self,
        owner: UserId,
        filter: &ItemFilter,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let t = self.read()?;
        let owned = t.items.values().filter(|i| i.owner == owner).cloned();
        Ok(filter.apply(owned))
    }
}

#[async_trait]
impl ReservationStore for InMemoryStore {
    async fn insert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut t = self.write()?;
        t.check_overlap(reservation)?;
        put(&mut t.reservations, reservation);
        Ok(())
    }

    async fn update_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut t = self.write()?;
        if !t.reservations.contains_key(&reservation.id) {
            return Err(StoreError::NotFound);
        }
        t.check_overlap(reservation)?;
        put(&mut t.reservations, reservation);
        Ok(())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        Ok(self.read()?.reservations.get(&id).cloned())
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        Ok(self.write()?.reservations.remove(&id).is_some())
    }

    async fn confirmed_overlapping(
        &self,
        room_key: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let t = self.read()?;
        let mut out: Vec<Reservation> = t
            .reservations
            .values()
            .filter(|r| r.is_confirmed())
            .filter(|r| room_key.is_none_or(|k| r.room_key == k))
            .filter(|r| r.slot.start() < end && start < r.slot.end())
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.slot.start(), r.id));
        Ok(out)
    }

    async fn upcoming_for_room(
        &self,
        room_key: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>, StoreError> {
        let t = self.read()?;
        let mut out: Vec<Reservation> = t
            .reservations
            .values()
            .filter(|r| r.is_confirmed() && r.room_key == room_key && r.slot.start() >= now)
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.slot.start(), r.id));
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn count_for_owner(
        &self,
        owner: UserId,
        query: &ReservationQuery,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let t = self.read()?;
        let n = t
            .reservations
            .values()
            .filter(|r| r.owner == owner && query.matches(r, now))
            .count();
        Ok(n as u64)
    }

    async fn list_for_owner(
        &self,
        owner: UserId,
        query: &ReservationQuery,
        now: DateTime<Utc>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Reservation>, StoreError> {
        let t = self.read()?;
        let mut out: Vec<Reservation> = t
            .reservations
            .values()
            .filter(|r| r.owner == owner && query.matches(r, now))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.slot.start().cmp(&a.slot.start()).then(b.id.cmp(&a.id)));
        Ok(out
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect())
    }

    async fn with_events_for_owner(&self, owner: UserId) -> Result<Vec<Reservation>, StoreError> {
        let t = self.read()?;
        Ok(t.reservations
            .values()
            .filter(|r| r.owner == owner && r.event_id.is_some())
            .cloned()
            .collect())
    }
}
