use serde::{Deserialize, Serialize};

use stockroom_catalog::{CategoryQuery, Pagination, ProductChanges, ProductSearch, SupplierQuery};
use stockroom_infra::PercentageBreakdown;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `PUT /products/:id`; the product id comes from the path.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_reference: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub product_category_id: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub stock_location: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub supplier_id: String,
}

impl UpdateProductRequest {
    pub fn into_changes(self, product_id: String) -> ProductChanges {
        ProductChanges {
            product_id,
            name: self.product_name,
            reference: self.product_reference,
            status: self.status,
            category_id: self.product_category_id,
            price: self.price,
            stock_location: self.stock_location,
            quantity: self.quantity,
            supplier_id: self.supplier_id,
        }
    }
}

/// Searches without an explicit limit get the default page size.
pub trait DefaultPage {
    fn pagination_mut(&mut self) -> &mut Pagination;

    fn with_default_limit(mut self) -> Self
    where
        Self: Sized,
    {
        let p = self.pagination_mut();
        *p = p.or_default_limit();
        self
    }
}

impl DefaultPage for ProductSearch {
    fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }
}

impl DefaultPage for SupplierQuery {
    fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }
}

impl DefaultPage for CategoryQuery {
    fn pagination_mut(&mut self) -> &mut Pagination {
        &mut self.pagination
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub dimension: &'static str,
    pub percentages: PercentageBreakdown,
}
