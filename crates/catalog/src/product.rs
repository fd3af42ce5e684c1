use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockroom_core::{CategoryId, DomainError, DomainResult, Entity, Field, ProductId, SupplierId};

use crate::category::ProductCategory;
use crate::status::ProductStatus;
use crate::supplier::Supplier;

/// Prefix every generated product reference starts with.
pub const REFERENCE_PREFIX: &str = "PROD";

/// A product row.
///
/// Each product belongs to exactly one category and one supplier; those two
/// references are what the per-category / per-supplier counters track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "product_id")]
    pub id: ProductId,
    #[serde(rename = "product_name")]
    pub name: String,
    #[serde(rename = "product_reference")]
    pub reference: String,
    pub status: ProductStatus,
    #[serde(rename = "product_category_id")]
    pub category_id: CategoryId,
    pub price: i64,
    pub stock_location: String,
    pub supplier_id: SupplierId,
    pub quantity: i64,
    pub date_created: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Product with its supplier and category joined in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub supplier: Option<Supplier>,
    pub product_category: Option<ProductCategory>,
}

/// Old and new category/supplier references of an updated product.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ReferenceShift {
    pub previous_category: CategoryId,
    pub category: CategoryId,
    pub previous_supplier: SupplierId,
    pub supplier: SupplierId,
}

impl ReferenceShift {
    pub fn category_changed(&self) -> bool {
        self.previous_category != self.category
    }

    pub fn supplier_changed(&self) -> bool {
        self.previous_supplier != self.supplier
    }

    pub fn is_unchanged(&self) -> bool {
        !self.category_changed() && !self.supplier_changed()
    }
}

/// Unvalidated product creation input (flat DTO shape).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    #[serde(default, rename = "product_name")]
    pub name: String,
    #[serde(default, rename = "product_reference")]
    pub reference: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "product_category_id")]
    pub category_id: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub stock_location: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub supplier_id: String,
}

impl NewProduct {
    /// Validate the draft and build the product row it describes.
    ///
    /// The stored reference is always `PROD-<YYYYMM>-<reference>`, where an
    /// empty reference is replaced with a random UUID.
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> DomainResult<Product> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation(Field::Name, "product name cannot be empty"));
        }

        let suffix = if self.reference.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.reference
        };
        let reference = format!("{REFERENCE_PREFIX}-{}-{suffix}", now.format("%Y%m"));

        let status = parse_status(&self.status)?;
        let category_id = parse_category(&self.category_id)?;
        if self.stock_location.trim().is_empty() {
            return Err(DomainError::validation(
                Field::StockLocation,
                "stock location cannot be empty",
            ));
        }
        let supplier_id = parse_supplier(&self.supplier_id)?;

        Ok(Product {
            id,
            name: self.name,
            reference,
            status,
            category_id,
            price: self.price,
            stock_location: self.stock_location,
            supplier_id,
            quantity: self.quantity,
            date_created: now,
        })
    }
}

/// Unvalidated product update input: a full replacement of the mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductChanges {
    #[serde(default)]
    pub product_id: String,
    #[serde(default, rename = "product_name")]
    pub name: String,
    #[serde(default, rename = "product_reference")]
    pub reference: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "product_category_id")]
    pub category_id: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub stock_location: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub supplier_id: String,
}

/// Product update that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedChanges {
    pub product_id: ProductId,
    pub name: String,
    pub reference: String,
    pub status: ProductStatus,
    pub category_id: CategoryId,
    pub price: i64,
    pub stock_location: String,
    pub quantity: i64,
    pub supplier_id: SupplierId,
}

impl ProductChanges {
    pub fn validate(self) -> DomainResult<ValidatedChanges> {
        let product_id = self
            .product_id
            .parse::<ProductId>()
            .map_err(|_| DomainError::validation(Field::Product, "product id must be a UUID"))?;
        if self.name.trim().is_empty() {
            return Err(DomainError::validation(Field::Name, "product name cannot be empty"));
        }
        if self.reference.trim().is_empty() {
            return Err(DomainError::validation(
                Field::Reference,
                "product reference cannot be empty",
            ));
        }
        let status = parse_status(&self.status)?;
        let category_id = parse_category(&self.category_id)?;
        if self.stock_location.trim().is_empty() {
            return Err(DomainError::validation(
                Field::StockLocation,
                "stock location cannot be empty",
            ));
        }
        let supplier_id = parse_supplier(&self.supplier_id)?;

        Ok(ValidatedChanges {
            product_id,
            name: self.name,
            reference: self.reference,
            status,
            category_id,
            price: self.price,
            stock_location: self.stock_location,
            quantity: self.quantity,
            supplier_id,
        })
    }
}

impl Product {
    /// Overwrite the mutable fields, returning how the references moved.
    ///
    /// `id` and `date_created` are never touched.
    pub fn apply_changes(&mut self, changes: ValidatedChanges) -> DomainResult<ReferenceShift> {
        if changes.product_id != self.id {
            return Err(DomainError::invariant("product_id mismatch"));
        }

        let shift = ReferenceShift {
            previous_category: self.category_id,
            category: changes.category_id,
            previous_supplier: self.supplier_id,
            supplier: changes.supplier_id,
        };

        self.name = changes.name;
        self.reference = changes.reference;
        self.status = changes.status;
        self.category_id = changes.category_id;
        self.price = changes.price;
        self.stock_location = changes.stock_location;
        self.quantity = changes.quantity;
        self.supplier_id = changes.supplier_id;

        Ok(shift)
    }
}

fn parse_status(raw: &str) -> DomainResult<ProductStatus> {
    raw.parse()
}

fn parse_category(raw: &str) -> DomainResult<CategoryId> {
    raw.parse()
        .map_err(|_| DomainError::validation(Field::Category, "category id must be a UUID"))
}

fn parse_supplier(raw: &str) -> DomainResult<SupplierId> {
    raw.parse()
        .map_err(|_| DomainError::validation(Field::Supplier, "supplier id must be a UUID"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    fn valid_draft() -> NewProduct {
        NewProduct {
            name: "Widget".to_string(),
            reference: "W-1".to_string(),
            status: "Available".to_string(),
            category_id: CategoryId::new().to_string(),
            price: 1250,
            stock_location: "Hanoi".to_string(),
            quantity: 4,
            supplier_id: SupplierId::new().to_string(),
        }
    }

    fn valid_changes(product: &Product) -> ValidatedChanges {
        ValidatedChanges {
            product_id: product.id,
            name: product.name.clone(),
            reference: product.reference.clone(),
            status: product.status,
            category_id: product.category_id,
            price: product.price,
            stock_location: product.stock_location.clone(),
            quantity: product.quantity,
            supplier_id: product.supplier_id,
        }
    }

    #[test]
    fn create_prefixes_reference_with_month() {
        let product = valid_draft().into_product(ProductId::new(), test_time()).unwrap();
        assert_eq!(product.reference, "PROD-202403-W-1");
        assert_eq!(product.date_created, test_time());
    }

    #[test]
    fn create_generates_reference_when_missing() {
        let mut draft = valid_draft();
        draft.reference = String::new();
        let product = draft.into_product(ProductId::new(), test_time()).unwrap();

        let suffix = product.reference.strip_prefix("PROD-202403-").unwrap();
        assert!(Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn create_reports_first_failing_field() {
        let mut draft = valid_draft();
        draft.name = String::new();
        draft.status = "nope".to_string();
        let err = draft.into_product(ProductId::new(), test_time()).unwrap_err();
        assert_eq!(err.field(), Some(Field::Name));

        let mut draft = valid_draft();
        draft.category_id = "cat-1".to_string();
        draft.supplier_id = "sup-1".to_string();
        let err = draft.into_product(ProductId::new(), test_time()).unwrap_err();
        assert_eq!(err.field(), Some(Field::Category));

        let mut draft = valid_draft();
        draft.stock_location = " ".to_string();
        let err = draft.into_product(ProductId::new(), test_time()).unwrap_err();
        assert_eq!(err.field(), Some(Field::StockLocation));

        let mut draft = valid_draft();
        draft.supplier_id = "sup-1".to_string();
        let err = draft.into_product(ProductId::new(), test_time()).unwrap_err();
        assert_eq!(err.field(), Some(Field::Supplier));
    }

    #[test]
    fn update_requires_product_id_and_reference() {
        let changes = ProductChanges {
            product_id: "x".to_string(),
            ..ProductChanges::default()
        };
        assert_eq!(changes.validate().unwrap_err().field(), Some(Field::Product));

        let changes = ProductChanges {
            product_id: ProductId::new().to_string(),
            name: "Widget".to_string(),
            ..ProductChanges::default()
        };
        assert_eq!(changes.validate().unwrap_err().field(), Some(Field::Reference));
    }

    #[test]
    fn apply_changes_reports_reference_shift() {
        let mut product = valid_draft().into_product(ProductId::new(), test_time()).unwrap();
        let old_category = product.category_id;
        let old_supplier = product.supplier_id;

        let mut changes = valid_changes(&product);
        let new_category = CategoryId::new();
        changes.category_id = new_category;
        changes.quantity = 99;

        let shift = product.apply_changes(changes).unwrap();
        assert!(shift.category_changed());
        assert!(!shift.supplier_changed());
        assert_eq!(shift.previous_category, old_category);
        assert_eq!(shift.category, new_category);
        assert_eq!(shift.previous_supplier, old_supplier);
        assert_eq!(product.category_id, new_category);
        assert_eq!(product.quantity, 99);
        assert_eq!(product.date_created, test_time());
    }

    #[test]
    fn apply_changes_rejects_foreign_product() {
        let mut product = valid_draft().into_product(ProductId::new(), test_time()).unwrap();
        let mut changes = valid_changes(&product);
        changes.product_id = ProductId::new();
        assert!(matches!(
            product.apply_changes(changes),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn detail_serializes_flat_with_nested_references() {
        let product = valid_draft().into_product(ProductId::new(), test_time()).unwrap();
        let detail = ProductDetail {
            product,
            supplier: None,
            product_category: None,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["product_name"], "Widget");
        assert_eq!(json["status"], "Available");
        assert!(json["supplier"].is_null());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: an unchanged update never reports a reference shift.
            #[test]
            fn identical_update_is_unchanged(
                name in "[A-Za-z][A-Za-z0-9 ]{0,40}",
                quantity in 0i64..10_000,
            ) {
                let mut product = valid_draft().into_product(ProductId::new(), test_time()).unwrap();
                let mut changes = valid_changes(&product);
                changes.name = name.clone();
                changes.quantity = quantity;

                let shift = product.apply_changes(changes).unwrap();
                prop_assert!(shift.is_unchanged());
                prop_assert_eq!(product.name, name);
            }

            /// Property: stored references always carry the month prefix.
            #[test]
            fn reference_always_prefixed(reference in "[A-Za-z0-9-]{0,24}") {
                let mut draft = valid_draft();
                draft.reference = reference;
                let product = draft.into_product(ProductId::new(), test_time()).unwrap();
                prop_assert!(product.reference.starts_with("PROD-202403-"));
            }
        }
    }
}
