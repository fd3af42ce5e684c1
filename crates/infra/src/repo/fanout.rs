//! Concurrent reference lookups.
//!
//! Both lookups run concurrently; the first failure wins and the sibling lookup is
//! dropped. Lookups are read-only, so abandoning one has no side effects.

use stockroom_catalog::{ProductCategory, Supplier};
use stockroom_core::{CategoryId, SupplierId};

use crate::store::CatalogStore;

use super::RepoError;

/// Check that the referenced supplier and category exist. `None` skips that side.
pub(super) async fn check_references(
    store: &dyn CatalogStore,
    supplier: Option<SupplierId>,
    category: Option<CategoryId>,
) -> Result<(), RepoError> {
    let supplier_check = async {
        let Some(id) = supplier else {
            return Ok::<(), RepoError>(());
        };
        match store.supplier(id).await? {
            Some(_) => Ok(()),
            None => Err(RepoError::InvalidSupplier),
        }
    };
    let category_check = async {
        let Some(id) = category else {
            return Ok::<(), RepoError>(());
        };
        match store.category(id).await? {
            Some(_) => Ok(()),
            None => Err(RepoError::InvalidCategory),
        }
    };
    tokio::try_join!(supplier_check, category_check)?;
    Ok(())
}

/// Resolve search filter ids to the suppliers and categories that exist.
pub(super) async fn resolve_filters(
    store: &dyn CatalogStore,
    suppliers: &[SupplierId],
    categories: &[CategoryId],
) -> Result<(Vec<Supplier>, Vec<ProductCategory>), RepoError> {
    let supplier_lookup = async {
        if suppliers.is_empty() {
            return Ok(Vec::new());
        }
        Ok::<_, RepoError>(store.suppliers_by_ids(suppliers).await?)
    };
    let category_lookup = async {
        if categories.is_empty() {
            return Ok(Vec::new());
        }
        Ok::<_, RepoError>(store.categories_by_ids(categories).await?)
    };
    tokio::try_join!(supplier_lookup, category_lookup)
}
