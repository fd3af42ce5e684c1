use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use stockroom_catalog::{NewSupplier, Page, Supplier, SupplierQuery};
use stockroom_core::SupplierId;

use crate::store::CatalogStore;

use super::{DEFAULT_REQUEST_TIMEOUT, RepoError, bounded};

#[derive(Clone)]
pub struct SupplierRepository {
    store: Arc<dyn CatalogStore>,
    timeout: Duration,
}

impl SupplierRepository {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[instrument(skip(self, draft), err)]
    pub async fn create(&self, draft: NewSupplier) -> Result<Supplier, RepoError> {
        let supplier = draft.into_supplier(SupplierId::new())?;
        bounded(self.timeout, async {
            self.store.insert_supplier(&supplier).await.map_err(RepoError::from)
        })
        .await?;
        info!(supplier_id = %supplier.id, "supplier created");
        Ok(supplier)
    }

    pub async fn get(&self, id: SupplierId) -> Result<Option<Supplier>, RepoError> {
        bounded(self.timeout, async { self.store.supplier(id).await.map_err(RepoError::from) }).await
    }

    /// The subset of `ids` that exist.
    pub async fn get_many(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, RepoError> {
        bounded(self.timeout, async { self.store.suppliers_by_ids(ids).await.map_err(RepoError::from) }).await
    }

    #[instrument(skip(self, query), err)]
    pub async fn search(&self, query: SupplierQuery) -> Result<Page<Supplier>, RepoError> {
        bounded(self.timeout, async { self.store.search_suppliers(&query).await.map_err(RepoError::from) }).await
    }
}
