//! Relational catalog store: products, suppliers and product categories.
//!
//! Product writes go through a [`CatalogTx`] so the caller can interleave other work
//! (counter updates) between the write and the commit. Dropping a transaction without
//! committing rolls it back.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;

use stockroom_catalog::{
    CategoryQuery, Page, Product, ProductCategory, ProductDetail, ProductQuery, Supplier,
    SupplierQuery,
};
use stockroom_core::{CategoryId, ProductId, SupplierId};

pub use in_memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("relational store unavailable: {0}")]
    Unavailable(String),

    #[error("relational store operation timed out")]
    Timeout,

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// An open relational transaction.
#[async_trait]
pub trait CatalogTx: Send {
    /// Load a product and lock it against concurrent updates until commit/rollback.
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn CatalogTx>, StoreError>;

    /// A product joined with its supplier and category, if those still exist.
    async fn product(&self, id: ProductId) -> Result<Option<ProductDetail>, StoreError>;

    /// Matching products. Bounded pages are ordered newest first.
    async fn search_products(&self, query: &ProductQuery) -> Result<Page<ProductDetail>, StoreError>;

    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError>;

    /// The subset of `ids` that exist.
    async fn suppliers_by_ids(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, StoreError>;

    async fn search_suppliers(&self, query: &SupplierQuery) -> Result<Page<Supplier>, StoreError>;

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError>;

    async fn category(&self, id: CategoryId) -> Result<Option<ProductCategory>, StoreError>;

    /// The subset of `ids` that exist.
    async fn categories_by_ids(&self, ids: &[CategoryId]) -> Result<Vec<ProductCategory>, StoreError>;

    async fn search_categories(&self, query: &CategoryQuery) -> Result<Page<ProductCategory>, StoreError>;

    async fn insert_category(&self, category: &ProductCategory) -> Result<(), StoreError>;
}
