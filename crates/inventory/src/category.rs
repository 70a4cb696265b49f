use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labdesk_core::{CategoryId, DomainError, Entity};

use crate::item::MAX_NAME_LEN;

/// A shared label for grouping inventory items.
///
/// Items refer to categories weakly: removing a category leaves its items in
/// place with no category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> CategoryId {
        self.id
    }
}

/// Command: CreateCategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

impl Category {
    /// Build a category, checking the name against the categories that already exist.
    pub fn create<'a>(
        cmd: &CreateCategory,
        existing: impl IntoIterator<Item = &'a Category>,
    ) -> Result<Self, DomainError> {
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("category name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "category name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }
        if existing.into_iter().any(|c| c.name == name) {
            return Err(DomainError::validation(format!(
                "category '{name}' already exists"
            )));
        }

        Ok(Self {
            id: CategoryId::new(),
            name: name.to_string(),
            created_at: cmd.occurred_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(name: &str) -> CreateCategory {
        CreateCategory {
            name: name.to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_category_names_are_rejected() {
        let none: Vec<Category> = Vec::new();
        let glassware = Category::create(&cmd("Glassware"), &none).unwrap();
        let err = Category::create(&cmd(" Glassware "), [&glassware]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("already exists")));
    }

    #[test]
    fn empty_category_name_is_rejected() {
        let none: Vec<Category> = Vec::new();
        assert!(Category::create(&cmd(""), &none).is_err());
    }
}
