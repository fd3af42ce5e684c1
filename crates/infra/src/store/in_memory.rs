use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use stockroom_catalog::{
    CategoryQuery, Page, Product, ProductCategory, ProductDetail, ProductQuery, Supplier,
    SupplierQuery,
};
use stockroom_core::{CategoryId, Entity, ProductId, SupplierId};

use super::{CatalogStore, CatalogTx, StoreError};

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    suppliers: BTreeMap<SupplierId, Supplier>,
    categories: BTreeMap<CategoryId, ProductCategory>,
}

impl Tables {
    fn detail(&self, product: &Product) -> ProductDetail {
        ProductDetail {
            product: product.clone(),
            supplier: self.suppliers.get(&product.supplier_id).cloned(),
            product_category: self.categories.get(&product.category_id).cloned(),
        }
    }
}

fn insert_unique<E: Entity + Clone>(
    table: &mut BTreeMap<E::Id, E>,
    entity: &E,
    kind: &str,
) -> Result<(), StoreError> {
    let id = entity.id();
    if table.contains_key(&id) {
        return Err(StoreError::Conflict(format!("{kind} {id} already exists")));
    }
    table.insert(id, entity.clone());
    Ok(())
}

#[derive(Debug, Default)]
struct Faults {
    failing_commits: u32,
    unavailable: bool,
    latency: Option<Duration>,
}

/// In-memory catalog store.
///
/// Intended for tests/dev. Write transactions are serialized: `begin` waits until the
/// previous transaction has committed, rolled back or been dropped. Writes are staged
/// inside the transaction and only become visible on commit.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogStore {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<tokio::sync::Mutex<()>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` commits. The staged writes are discarded.
    pub fn fail_next_commits(&self, n: u32) {
        self.with_faults(|f| f.failing_commits = n);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.with_faults(|f| f.unavailable = unavailable);
    }

    /// Delay every read and `begin` by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.with_faults(|f| f.latency = latency);
    }

    /// Number of committed products.
    pub fn product_count(&self) -> usize {
        self.tables.read().map(|t| t.products.len()).unwrap_or(0)
    }

    /// Every committed product.
    pub fn products(&self) -> Vec<Product> {
        self.tables
            .read()
            .map(|t| t.products.values().cloned().collect())
            .unwrap_or_default()
    }

    fn with_faults(&self, f: impl FnOnce(&mut Faults)) {
        if let Ok(mut faults) = self.faults.lock() {
            f(&mut faults);
        }
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        let latency = {
            let faults = self.faults.lock().map_err(|_| poisoned())?;
            if faults.unavailable {
                return Err(StoreError::Unavailable("store marked unavailable".to_string()));
            }
            faults.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;
        Ok(f(&tables))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> Result<T, StoreError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        Ok(f(&mut tables))
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

struct InMemoryTx {
    store: InMemoryCatalogStore,
    staged: BTreeMap<ProductId, Product>,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl CatalogTx for InMemoryTx {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        if let Some(staged) = self.staged.get(&id) {
            return Ok(Some(staged.clone()));
        }
        self.store.read(|t| t.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let exists = self.staged.contains_key(&product.id)
            || self.store.read(|t| t.products.contains_key(&product.id))?;
        if exists {
            return Err(StoreError::Conflict(format!("product {} already exists", product.id)));
        }
        self.staged.insert(product.id, product.clone());
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let exists = self.staged.contains_key(&product.id)
            || self.store.read(|t| t.products.contains_key(&product.id))?;
        if !exists {
            return Err(StoreError::Conflict(format!("product {} does not exist", product.id)));
        }
        self.staged.insert(product.id, product.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        {
            let mut faults = this.store.faults.lock().map_err(|_| poisoned())?;
            if faults.failing_commits > 0 {
                faults.failing_commits -= 1;
                return Err(StoreError::Unavailable("injected commit failure".to_string()));
            }
        }
        let staged = this.staged;
        this.store.write(|t| t.products.extend(staged))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTx>, StoreError> {
        self.check_available().await?;
        let writer = self.writer.clone().lock_owned().await;
        Ok(Box::new(InMemoryTx {
            store: self.clone(),
            staged: BTreeMap::new(),
            _writer: writer,
        }))
    }

    async fn product(&self, id: ProductId) -> Result<Option<ProductDetail>, StoreError> {
        self.check_available().await?;
        self.read(|t| t.products.get(&id).map(|p| t.detail(p)))
    }

    async fn search_products(&self, query: &ProductQuery) -> Result<Page<ProductDetail>, StoreError> {
        self.check_available().await?;
        self.read(|t| {
            let mut matched: Vec<&Product> = t.products.values().filter(|p| query.matches(p)).collect();
            if !query.pagination.is_unbounded() {
                matched.sort_by(|a, b| b.date_created.cmp(&a.date_created).then(b.id.cmp(&a.id)));
            }
            let total = matched.len() as u64;
            let data = query
                .pagination
                .window(matched)
                .into_iter()
                .map(|p| t.detail(p))
                .collect();
            Page::new(data, total, query.pagination)
        })
    }

    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        self.check_available().await?;
        self.read(|t| t.suppliers.get(&id).cloned())
    }

    async fn suppliers_by_ids(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, StoreError> {
        self.check_available().await?;
        self.read(|t| ids.iter().filter_map(|id| t.suppliers.get(id).cloned()).collect())
    }

    async fn search_suppliers(&self, query: &SupplierQuery) -> Result<Page<Supplier>, StoreError> {
        self.check_available().await?;
        self.read(|t| {
            let matched: Vec<&Supplier> = t.suppliers.values().filter(|s| query.matches(s)).collect();
            let total = matched.len() as u64;
            let data = query.pagination.window(matched).into_iter().cloned().collect();
            Page::new(data, total, query.pagination)
        })
    }

    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        self.check_available().await?;
        self.write(|t| insert_unique(&mut t.suppliers, supplier, "supplier"))?
    }

    async fn category(&self, id: CategoryId) -> Result<Option<ProductCategory>, StoreError> {
        self.check_available().await?;
        self.read(|t| t.categories.get(&id).cloned())
    }

    async fn categories_by_ids(&self, ids: &[CategoryId]) -> Result<Vec<ProductCategory>, StoreError> {
        self.check_available().await?;
        self.read(|t| ids.iter().filter_map(|id| t.categories.get(id).cloned()).collect())
    }

    async fn search_categories(&self, query: &CategoryQuery) -> Result<Page<ProductCategory>, StoreError> {
        self.check_available().await?;
        self.read(|t| {
            let matched: Vec<&ProductCategory> =
                t.categories.values().filter(|c| query.matches(c)).collect();
            let total = matched.len() as u64;
            let data = query.pagination.window(matched).into_iter().cloned().collect();
            Page::new(data, total, query.pagination)
        })
    }

    async fn insert_category(&self, category: &ProductCategory) -> Result<(), StoreError> {
        self.check_available().await?;
        self.write(|t| insert_unique(&mut t.categories, category, "category"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use stockroom_catalog::{Pagination, ProductStatus, RecordStatus};

    fn supplier() -> Supplier {
        Supplier {
            id: SupplierId::new(),
            name: "Acme".to_string(),
            status: RecordStatus::Active,
        }
    }

    fn product(supplier_id: SupplierId, minutes_ago: i64) -> Product {
        Product {
            id: ProductId::new(),
            name: "Widget".to_string(),
            reference: "PROD-202405-W".to_string(),
            status: ProductStatus::Available,
            category_id: CategoryId::new(),
            price: 100,
            stock_location: "Hanoi".to_string(),
            supplier_id,
            quantity: 3,
            date_created: Utc::now() - ChronoDuration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let store = InMemoryCatalogStore::new();
        let p = product(SupplierId::new(), 0);

        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&p).await.unwrap();
        assert!(store.product(p.id).await.unwrap().is_none());
        tx.commit().await.unwrap();
        assert!(store.product(p.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = InMemoryCatalogStore::new();
        let p = product(SupplierId::new(), 0);
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_product(&p).await.unwrap();
        }
        assert_eq!(store.product_count(), 0);
        // lock released by drop
        let tx = store.begin().await.unwrap();
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn failed_commit_discards_writes() {
        let store = InMemoryCatalogStore::new();
        store.fail_next_commits(1);
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&product(SupplierId::new(), 0)).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(store.product_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = InMemoryCatalogStore::new();
        let p = product(SupplierId::new(), 0);
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&p).await.unwrap();
        assert!(matches!(tx.insert_product(&p).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn bounded_search_is_newest_first_and_joined() {
        let store = InMemoryCatalogStore::new();
        let s = supplier();
        store.insert_supplier(&s).await.unwrap();
        let old = product(s.id, 30);
        let new = product(s.id, 1);
        let mut tx = store.begin().await.unwrap();
        tx.insert_product(&old).await.unwrap();
        tx.insert_product(&new).await.unwrap();
        tx.commit().await.unwrap();

        let query = ProductQuery {
            pagination: Pagination::new(1, 0),
            ..ProductQuery::default()
        };
        let page = store.search_products(&query).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].product.id, new.id);
        assert_eq!(page.data[0].supplier.as_ref().map(|s| s.id), Some(s.id));
        assert!(page.data[0].product_category.is_none());
    }

    #[tokio::test]
    async fn suppliers_by_ids_returns_existing_subset() {
        let store = InMemoryCatalogStore::new();
        let s = supplier();
        store.insert_supplier(&s).await.unwrap();
        let found = store.suppliers_by_ids(&[s.id, SupplierId::new()]).await.unwrap();
        assert_eq!(found, vec![s]);
    }
}
