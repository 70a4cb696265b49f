//! Postgres-backed stores.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError  | Scenario |
//! |-----------------------|-------------|----------|
//! | `23505`               | `Duplicate` | `uq_*` unique constraint (item name per owner, category name) |
//! | `23P01`               | `Conflict`  | `ex_reservations_no_overlap` exclusion constraint |
//! | `23503`               | `NotFound`  | Referenced user or category does not exist |
//! | anything else         | `Storage`   | Connection failures, check violations, decode errors |
//!
//! The exclusion constraint is what closes the check-then-insert race for
//! reservations: two transactions that both passed the service-level conflict
//! check cannot both commit overlapping confirmed rows.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Row};
use tracing::{Span, error, field, instrument};
use uuid::Uuid;

use labdesk_core::{CategoryId, ItemId, ReservationId, UserId};
use labdesk_inventory::{Category, InventoryItem, ItemFilter, Quantity, QuantitySort};
use labdesk_reservations::{Reservation, ReservationStatus, TimeSlot};

use super::{CategoryStore, ItemStore, ReservationStore, StoreError, UserStore};
use crate::query::ReservationQuery;

const ITEM_COLUMNS: &str = "item_id, owner_id, name, quantity, category_id, created_at, updated_at";
const RESERVATION_COLUMNS: &str = "reservation_id, owner_id, room_key, start_time, end_time, \
     purpose, status, event_id, created_at, updated_at";

/// Store implementation over one connection pool, covering every store trait.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("migration failed: {e}")))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Duplicate(constraint),
                Some("23P01") => StoreError::Conflict(constraint),
                Some("23503") => StoreError::NotFound,
                _ => {
                    error!(operation, error = %db_err, "database error");
                    StoreError::Storage(format!("database error in {operation}"))
                }
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        other => {
            error!(operation, error = %other, "database error");
            StoreError::Storage(format!("sqlx error in {operation}"))
        }
    }
}

struct ItemRow(InventoryItem);

impl<'r> FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let quantity: i32 = row.try_get("quantity")?;
        let quantity = Quantity::new(i64::from(quantity)).map_err(|e| sqlx::Error::ColumnDecode {
            index: "quantity".into(),
            source: Box::new(e),
        })?;
        Ok(ItemRow(InventoryItem {
            id: ItemId::from_uuid(row.try_get("item_id")?),
            owner: UserId::from_uuid(row.try_get("owner_id")?),
            name: row.try_get("name")?,
            quantity,
            category: row
                .try_get::<Option<Uuid>, _>("category_id")?
                .map(CategoryId::from_uuid),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

struct CategoryRow(Category);

impl<'r> FromRow<'r, PgRow> for CategoryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CategoryRow(Category {
            id: CategoryId::from_uuid(row.try_get("category_id")?),
            name: row.try_get("name")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}

struct ReservationRow(Reservation);

impl<'r> FromRow<'r, PgRow> for ReservationRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status: ReservationStatus = status.parse().map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".into(),
            source: Box::new(e),
        })?;
        let slot = TimeSlot::new(row.try_get("start_time")?, row.try_get("end_time")?).map_err(|e| {
            sqlx::Error::ColumnDecode {
                index: "end_time".into(),
                source: Box::new(e),
            }
        })?;
        Ok(ReservationRow(Reservation {
            id: ReservationId::from_uuid(row.try_get("reservation_id")?),
            owner: UserId::from_uuid(row.try_get("owner_id")?),
            room_key: row.try_get("room_key")?,
            slot,
            purpose: row.try_get("purpose")?,
            status,
            event_id: row.try_get("event_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn ensure_user(&self, user: UserId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user), err)]
    async fn delete_user(&self, user: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CategoryStore for PostgresStore {
    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&self, category: &Category) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO categories (category_id, name, created_at) VALUES ($1, $2, $3)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(category.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT category_id, name, created_at FROM categories WHERE category_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_category", e))?;
        Ok(row.map(|r| r.0))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT category_id, name, created_at FROM categories ORDER BY name",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_categories", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    #[instrument(skip(self), fields(category_id = %id), err)]
    async fn delete_category(&self, id: CategoryId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE category_id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_category", e))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ItemStore for PostgresStore {
    #[instrument(skip(self, item), fields(item_id = %item.id, owner_id = %item.owner), err)]
    async fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO inventory_items ({ITEM_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(item.id.as_uuid())
        .bind(item.owner.as_uuid())
        .bind(&item.name)
        .bind(item.quantity.get() as i32)
        .bind(item.category.map(Uuid::from))
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(item_id = %item.id), err)]
    async fn update_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE inventory_items SET name = $2, quantity = $3, category_id = $4, updated_at = $5 \
             WHERE item_id = $1",
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(item.quantity.get() as i32)
        .bind(item.category.map(Uuid::from))
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items WHERE item_id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_item", e))?;
        Ok(row.map(|r| r.0))
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete_item(&self, id: ItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM inventory_items WHERE item_id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, filter), fields(owner_id = %owner, item_count = field::Empty), err)]
    async fn list_items(
        &self,
        owner: UserId,
        filter: &ItemFilter,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let order = match filter.sort {
            QuantitySort::Insertion => "item_id",
            QuantitySort::LowToHigh => "quantity ASC, item_id",
            QuantitySort::HighToLow => "quantity DESC, item_id",
        };
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items \
             WHERE owner_id = $1 \
               AND ($2::uuid IS NULL OR category_id = $2) \
               AND ($3::text IS NULL OR strpos(lower(name), $3) > 0) \
             ORDER BY {order}"
        ))
        .bind(owner.as_uuid())
        .bind(filter.category.map(Uuid::from))
        .bind(filter.needle())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        Span::current().record("item_count", rows.len());
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

#[async_trait]
impl ReservationStore for PostgresStore {
    #[instrument(skip(self, r), fields(reservation_id = %r.id, room_key = %r.room_key), err)]
    async fn insert_reservation(&self, r: &Reservation) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO reservations ({RESERVATION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(r.id.as_uuid())
        .bind(r.owner.as_uuid())
        .bind(&r.room_key)
        .bind(r.slot.start())
        .bind(r.slot.end())
        .bind(&r.purpose)
        .bind(r.status.as_str())
        .bind(r.event_id.as_deref())
        .bind(r.created_at)
        .bind(r.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_reservation", e))?;
        Ok(())
    }

    #[instrument(skip(self, r), fields(reservation_id = %r.id, status = %r.status), err)]
    async fn update_reservation(&self, r: &Reservation) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE reservations SET start_time = $2, end_time = $3, purpose = $4, status = $5, \
             event_id = $6, updated_at = $7 WHERE reservation_id = $1",
        )
        .bind(r.id.as_uuid())
        .bind(r.slot.start())
        .bind(r.slot.end())
        .bind(&r.purpose)
        .bind(r.status.as_str())
        .bind(r.event_id.as_deref())
        .bind(r.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_reservation", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE reservation_id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_reservation", e))?;
        Ok(row.map(|r| r.0))
    }

    #[instrument(skip(self), fields(reservation_id = %id), err)]
    async fn delete_reservation(&self, id: ReservationId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM reservations WHERE reservation_id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_reservation", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn confirmed_overlapping(
        &self,
        room_key: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = 'confirmed' \
               AND ($1::text IS NULL OR room_key = $1) \
               AND start_time < $3 AND end_time > $2 \
             ORDER BY start_time, reservation_id"
        ))
        .bind(room_key)
        .bind(start)
        .bind(end)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("confirmed_overlapping", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn upcoming_for_room(
        &self,
        room_key: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE status = 'confirmed' AND room_key = $1 AND start_time >= $2 \
             ORDER BY start_time, reservation_id LIMIT $3"
        ))
        .bind(room_key)
        .bind(now)
        .bind(i64::from(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upcoming_for_room", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn count_for_owner(
        &self,
        owner: UserId,
        query: &ReservationQuery,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM reservations \
             WHERE owner_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3 OR end_time >= $4)",
        )
        .bind(owner.as_uuid())
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.show_past)
        .bind(now)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_for_owner", e))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| map_sqlx_error("count_for_owner", e))?;
        Ok(n.max(0) as u64)
    }

    #[instrument(skip(self, query), fields(owner_id = %owner, offset, limit), err)]
    async fn list_for_owner(
        &self,
        owner: UserId,
        query: &ReservationQuery,
        now: DateTime<Utc>,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE owner_id = $1 \
               AND ($2::text IS NULL OR status = $2) \
               AND ($3 OR end_time >= $4) \
             ORDER BY start_time DESC, reservation_id DESC \
             LIMIT $5 OFFSET $6"
        ))
        .bind(owner.as_uuid())
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.show_past)
        .bind(now)
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_owner", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    async fn with_events_for_owner(&self, owner: UserId) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE owner_id = $1 AND event_id IS NOT NULL"
        ))
        .bind(owner.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("with_events_for_owner", e))?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}
