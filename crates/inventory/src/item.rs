use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labdesk_core::{CategoryId, DomainError, Entity, ItemId, UserId, ValueObject};

/// Longest accepted item name, in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Stock level of an item.
///
/// Always non-negative; bounded by `i32::MAX` so it fits the storage column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(raw: i64) -> Result<Self, DomainError> {
        if raw < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if raw > i64::from(i32::MAX) {
            return Err(DomainError::validation("quantity is too large"));
        }
        Ok(Self(raw as u32))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl ValueObject for Quantity {}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// An inventory item owned by a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: ItemId,
    pub owner: UserId,
    pub name: String,
    pub quantity: Quantity,
    pub category: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

/// Command: CreateItem.
///
/// `quantity` is the raw submitted value; negative values are rejected here
/// rather than at deserialization so callers get a validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub owner: UserId,
    pub name: String,
    pub quantity: i64,
    pub category: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem. Replaces the user-editable fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub name: String,
    pub quantity: i64,
    pub category: Option<CategoryId>,
    pub occurred_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Build a new item from a create command.
    pub fn create(cmd: &CreateItem) -> Result<Self, DomainError> {
        let name = normalize_name(&cmd.name)?;
        let quantity = Quantity::new(cmd.quantity)?;

        Ok(Self {
            id: ItemId::new(),
            owner: cmd.owner,
            name,
            quantity,
            category: cmd.category,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    /// Produce the updated item; `self` is left untouched if validation fails.
    pub fn updated(&self, cmd: &UpdateItem) -> Result<Self, DomainError> {
        let name = normalize_name(&cmd.name)?;
        let quantity = Quantity::new(cmd.quantity)?;

        Ok(Self {
            name,
            quantity,
            category: cmd.category,
            updated_at: cmd.occurred_at,
            ..self.clone()
        })
    }

    pub fn is_low_stock(&self, threshold: u32) -> bool {
        self.quantity.get() <= threshold
    }

    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == user
    }
}

fn normalize_name(raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Reject `name` if another of the owner's items already uses it.
///
/// `exclude` is the id of the item being updated, which may keep its own name.
pub fn ensure_name_available<'a>(
    existing: impl IntoIterator<Item = &'a InventoryItem>,
    name: &str,
    exclude: Option<ItemId>,
) -> Result<(), DomainError> {
    let taken = existing
        .into_iter()
        .any(|item| item.name == name && Some(item.id) != exclude);
    if taken {
        return Err(DomainError::validation(format!(
            "an item named '{name}' already exists"
        )));
    }
    Ok(())
}
