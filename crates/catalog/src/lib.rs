//! Catalog domain module.
//!
//! Products, suppliers and product categories, their validation rules and the
//! search filters over them, implemented as deterministic domain logic (no IO,
//! no HTTP, no storage).

pub mod category;
pub mod product;
pub mod query;
pub mod status;
pub mod supplier;

pub use category::{NewCategory, ProductCategory};
pub use product::{NewProduct, Product, ProductChanges, ProductDetail, ReferenceShift, ValidatedChanges};
pub use query::{CategoryQuery, Page, Pagination, ProductQuery, ProductSearch, SupplierQuery};
pub use status::{ProductStatus, RecordStatus};
pub use supplier::{NewSupplier, Supplier};
