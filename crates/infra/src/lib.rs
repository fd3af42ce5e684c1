//! Infrastructure layer: counter cache, relational store, repositories.

pub mod counters;
pub mod repo;
pub mod store;


pub use counters::{
    AggregateCounterManager, CounterError, CounterKeys, CounterStore, Dimension,
    InMemoryCounterStore, PercentageBreakdown,
};
pub use repo::{CategoryRepository, ProductRepository, RepoError, SupplierRepository};
pub use store::{CatalogStore, InMemoryCatalogStore, PostgresCatalogStore, StoreError};
