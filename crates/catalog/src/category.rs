use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, Entity, Field};

use crate::status::RecordStatus;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategory {
    #[serde(rename = "product_category_id")]
    pub id: CategoryId,
    #[serde(rename = "product_category_name")]
    pub name: String,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for ProductCategory {
    type Id = CategoryId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Unvalidated category creation input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewCategory {
    #[serde(default, rename = "product_category_name")]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl NewCategory {
    pub fn into_category(self, id: CategoryId, now: DateTime<Utc>) -> DomainResult<ProductCategory> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation(Field::Name, "category name cannot be empty"));
        }
        let status: RecordStatus = self.status.parse()?;

        Ok(ProductCategory {
            id,
            name: self.name,
            status,
            created_at: now,
            updated_at: now,
        })
    }
}
