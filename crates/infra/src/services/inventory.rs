use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use labdesk_core::{CategoryId, Clock, DomainError, ItemId, UserId};
use labdesk_inventory::{
    Category, CreateCategory, CreateItem, InventoryItem, ItemFilter, LowStockSummary, UpdateItem,
    ensure_name_available, suggestions,
};

use super::{ServiceError, SharedStore};

/// Fields submitted to create an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub quantity: i64,
    pub category: Option<CategoryId>,
}

/// Replacement values for an item's editable fields.
pub type ItemChanges = NewItem;

/// Dashboard payload: the filtered items plus the owner-wide low-stock banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemListing {
    pub items: Vec<InventoryItem>,
    pub low_stock: LowStockSummary,
}

/// Owner-scoped inventory operations and shared categories.
///
/// Categories are visible to everyone but only category administrators may
/// create or delete them.
#[derive(Clone)]
pub struct InventoryService {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    low_stock_threshold: u32,
    category_admins: Arc<HashSet<UserId>>,
}

impl InventoryService {
    pub fn new(store: SharedStore, clock: Arc<dyn Clock>, low_stock_threshold: u32) -> Self {
        Self {
            store,
            clock,
            low_stock_threshold,
            category_admins: Arc::default(),
        }
    }

    pub fn with_category_admins(mut self, admins: impl IntoIterator<Item = UserId>) -> Self {
        self.category_admins = Arc::new(admins.into_iter().collect());
        self
    }

    pub fn can_manage_categories(&self, user: UserId) -> bool {
        self.category_admins.contains(&user)
    }

    pub fn low_stock_threshold(&self) -> u32 {
        self.low_stock_threshold
    }

    #[instrument(skip(self, input), fields(owner_id = %owner), err)]
    pub async fn create_item(
        &self,
        owner: UserId,
        input: NewItem,
    ) -> Result<InventoryItem, ServiceError> {
        self.ensure_category(input.category).await?;
        let item = InventoryItem::create(&CreateItem {
            owner,
            name: input.name,
            quantity: input.quantity,
            category: input.category,
            occurred_at: self.clock.now(),
        })?;

        let existing = self.store.list_items(owner, &ItemFilter::default()).await?;
        ensure_name_available(&existing, &item.name, None).map_err(duplicate_name)?;

        self.store.ensure_user(owner).await?;
        self.store.insert_item(&item).await?;
        info!(item_id = %item.id, quantity = %item.quantity, "item created");
        Ok(item)
    }

    pub async fn get_item(&self, owner: UserId, id: ItemId) -> Result<InventoryItem, ServiceError> {
        match self.store.get_item(id).await? {
            Some(item) if item.is_owned_by(owner) => Ok(item),
            _ => Err(ServiceError::NotFound),
        }
    }

    #[instrument(skip(self, changes), fields(owner_id = %owner, item_id = %id), err)]
    pub async fn update_item(
        &self,
        owner: UserId,
        id: ItemId,
        changes: ItemChanges,
    ) -> Result<InventoryItem, ServiceError> {
        let current = self.get_item(owner, id).await?;
        self.ensure_category(changes.category).await?;
        let updated = current.updated(&UpdateItem {
            name: changes.name,
            quantity: changes.quantity,
            category: changes.category,
            occurred_at: self.clock.now(),
        })?;

        let existing = self.store.list_items(owner, &ItemFilter::default()).await?;
        ensure_name_available(&existing, &updated.name, Some(id)).map_err(duplicate_name)?;

        self.store.update_item(&updated).await?;
        info!(quantity = %updated.quantity, "item updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(owner_id = %owner, item_id = %id), err)]
    pub async fn delete_item(&self, owner: UserId, id: ItemId) -> Result<(), ServiceError> {
        self.get_item(owner, id).await?;
        if !self.store.delete_item(id).await? {
            return Err(ServiceError::NotFound);
        }
        info!("item deleted");
        Ok(())
    }

    pub async fn list_items(
        &self,
        owner: UserId,
        filter: &ItemFilter,
    ) -> Result<ItemListing, ServiceError> {
        let items = self.store.list_items(owner, filter).await?;
        let all = self.store.list_items(owner, &ItemFilter::default()).await?;
        Ok(ItemListing {
            items,
            low_stock: LowStockSummary::from_items(&all, self.low_stock_threshold),
        })
    }

    /// Items at or below `threshold` (the configured threshold when `None`).
    pub async fn low_stock(
        &self,
        owner: UserId,
        threshold: Option<u32>,
    ) -> Result<Vec<InventoryItem>, ServiceError> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        let items = self.store.list_items(owner, &ItemFilter::default()).await?;
        Ok(items
            .into_iter()
            .filter(|i| i.is_low_stock(threshold))
            .collect())
    }

    pub async fn suggestions(&self, owner: UserId, text: &str) -> Result<Vec<String>, ServiceError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let items = self.store.list_items(owner, &ItemFilter::default()).await?;
        Ok(suggestions(&items, text))
    }

    #[instrument(skip(self), fields(actor = %actor), err)]
    pub async fn create_category(&self, actor: UserId, name: &str) -> Result<Category, ServiceError> {
        self.ensure_category_admin(actor)?;
        let existing = self.store.list_categories().await?;
        let category = Category::create(
            &CreateCategory {
                name: name.to_string(),
                occurred_at: self.clock.now(),
            },
            &existing,
        )?;
        self.store.insert_category(&category).await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        Ok(self.store.list_categories().await?)
    }

    /// Items of every owner that used the category are detached, not deleted.
    #[instrument(skip(self), fields(actor = %actor, category_id = %id), err)]
    pub async fn delete_category(&self, actor: UserId, id: CategoryId) -> Result<(), ServiceError> {
        self.ensure_category_admin(actor)?;
        if !self.store.delete_category(id).await? {
            return Err(ServiceError::NotFound);
        }
        info!("category deleted");
        Ok(())
    }

    fn ensure_category_admin(&self, actor: UserId) -> Result<(), ServiceError> {
        if self.can_manage_categories(actor) {
            return Ok(());
        }
        Err(ServiceError::Forbidden(
            "only category administrators can change categories".into(),
        ))
    }

    async fn ensure_category(&self, category: Option<CategoryId>) -> Result<(), ServiceError> {
        let Some(id) = category else {
            return Ok(());
        };
        match self.store.get_category(id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::validation(
                "unknown_category",
                format!("category {id} does not exist"),
            )),
        }
    }
}

fn duplicate_name(err: DomainError) -> ServiceError {
    match err {
        DomainError::Validation(msg) => ServiceError::validation("duplicate_name", msg),
        other => other.into(),
    }
}
