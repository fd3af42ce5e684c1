//! Product repository.
//!
//! Every create and update follows the same ordering:
//!
//! 1. validate the draft and check referenced supplier/category exist (concurrently)
//! 2. open a relational transaction and write the row
//! 3. apply the counter delta
//! 4. commit
//!
//! A failure in 2 or 3 rolls the transaction back, so a product row is never persisted
//! without its counters. The converse is not covered: if the commit in 4 fails after the
//! counter delta succeeded, the counters are ahead of the relational store. That case
//! is logged at `error` with the product and its references and is not compensated.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use stockroom_catalog::{NewProduct, Page, Product, ProductChanges, ProductDetail, ProductQuery, ValidatedChanges};
use stockroom_core::ProductId;

use crate::counters::{AggregateCounterManager, Dimension, PercentageBreakdown};
use crate::store::{CatalogStore, CatalogTx};

use super::{DEFAULT_REQUEST_TIMEOUT, RepoError, bounded, fanout};

#[derive(Clone)]
pub struct ProductRepository {
    store: Arc<dyn CatalogStore>,
    counters: AggregateCounterManager,
    timeout: Duration,
}

impl ProductRepository {
    pub fn new(store: Arc<dyn CatalogStore>, counters: AggregateCounterManager) -> Self {
        Self {
            store,
            counters,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn counters(&self) -> &AggregateCounterManager {
        &self.counters
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn get(&self, id: ProductId) -> Result<ProductDetail, RepoError> {
        bounded(self.timeout, async {
            self.store
                .product(id)
                .await
                .map_err(RepoError::from)
                .and_then(|found| found.ok_or(RepoError::NotFound))
        })
        .await
    }

    /// Search products.
    ///
    /// Category and supplier filters are first resolved to the entities that exist. A
    /// filter that was given but matches nothing yields an empty page.
    #[instrument(skip(self, query), err)]
    pub async fn search(&self, query: ProductQuery) -> Result<Page<ProductDetail>, RepoError> {
        bounded(self.timeout, self.search_resolved(query)).await
    }

    async fn search_resolved(&self, mut query: ProductQuery) -> Result<Page<ProductDetail>, RepoError> {
        let wants_suppliers = !query.supplier_ids.is_empty();
        let wants_categories = !query.category_ids.is_empty();
        let (suppliers, categories) =
            fanout::resolve_filters(self.store.as_ref(), &query.supplier_ids, &query.category_ids).await?;

        if (wants_suppliers && suppliers.is_empty()) || (wants_categories && categories.is_empty()) {
            return Ok(Page::empty(query.pagination));
        }
        query.supplier_ids = suppliers.into_iter().map(|s| s.id).collect();
        query.category_ids = categories.into_iter().map(|c| c.id).collect();

        Ok(self.store.search_products(&query).await?)
    }

    #[instrument(skip(self, draft), err)]
    pub async fn create(&self, draft: NewProduct) -> Result<Product, RepoError> {
        let product = draft.into_product(ProductId::new(), Utc::now())?;
        bounded(self.timeout, self.create_validated(product)).await
    }

    async fn create_validated(&self, product: Product) -> Result<Product, RepoError> {
        fanout::check_references(
            self.store.as_ref(),
            Some(product.supplier_id),
            Some(product.category_id),
        )
        .await?;

        let mut tx = self.store.begin().await?;
        if let Err(err) = self.stage_create(tx.as_mut(), &product).await {
            rollback(tx).await;
            return Err(err);
        }
        self.commit(tx, &product).await?;

        info!(
            product_id = %product.id,
            category_id = %product.category_id,
            supplier_id = %product.supplier_id,
            "product created"
        );
        Ok(product)
    }

    async fn stage_create(&self, tx: &mut dyn CatalogTx, product: &Product) -> Result<(), RepoError> {
        tx.insert_product(product).await?;
        self.counters
            .apply_create_delta(product.category_id, product.supplier_id)
            .await
            .inspect_err(|err| warn!(product_id = %product.id, error = %err, "counter delta failed, rolling back"))?;
        Ok(())
    }

    #[instrument(skip(self, changes), err)]
    pub async fn update(&self, changes: ProductChanges) -> Result<Product, RepoError> {
        let changes = changes.validate()?;
        bounded(self.timeout, self.update_validated(changes)).await
    }

    async fn update_validated(&self, changes: ValidatedChanges) -> Result<Product, RepoError> {
        let mut tx = self.store.begin().await?;
        let product = match self.stage_update(tx.as_mut(), changes).await {
            Ok(product) => product,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };
        self.commit(tx, &product).await?;

        info!(product_id = %product.id, "product updated");
        Ok(product)
    }

    async fn stage_update(
        &self,
        tx: &mut dyn CatalogTx,
        changes: ValidatedChanges,
    ) -> Result<Product, RepoError> {
        let mut product = tx
            .product_for_update(changes.product_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        let shift = product.apply_changes(changes)?;

        fanout::check_references(
            self.store.as_ref(),
            shift.supplier_changed().then_some(shift.supplier),
            shift.category_changed().then_some(shift.category),
        )
        .await?;

        tx.update_product(&product).await?;
        self.counters
            .apply_update_delta(&shift)
            .await
            .inspect_err(|err| warn!(product_id = %product.id, error = %err, "counter delta failed, rolling back"))?;
        Ok(product)
    }

    async fn commit(&self, tx: Box<dyn CatalogTx>, product: &Product) -> Result<(), RepoError> {
        tx.commit().await.map_err(|err| {
            error!(
                product_id = %product.id,
                category_id = %product.category_id,
                supplier_id = %product.supplier_id,
                error = %err,
                "relational commit failed after counter delta was applied; counters are ahead of the store"
            );
            RepoError::from(err)
        })
    }

    /// Share of all products per category, in percent.
    pub async fn percentage_per_category(&self) -> Result<PercentageBreakdown, RepoError> {
        self.percentages(Dimension::Category).await
    }

    /// Share of all products per supplier, in percent.
    pub async fn percentage_per_supplier(&self) -> Result<PercentageBreakdown, RepoError> {
        self.percentages(Dimension::Supplier).await
    }

    async fn percentages(&self, dimension: Dimension) -> Result<PercentageBreakdown, RepoError> {
        bounded(self.timeout, async {
            self.counters
                .percentage_breakdown(dimension)
                .await
                .map_err(RepoError::from)
        })
        .await
    }
}

async fn rollback(tx: Box<dyn CatalogTx>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "rollback failed; transaction is dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::{CounterError, CounterKeys, InMemoryCounterStore};
    use crate::store::{InMemoryCatalogStore, StoreError};
    use stockroom_catalog::{NewCategory, NewSupplier, ProductCategory, Supplier};
    use stockroom_core::{CategoryId, SupplierId};

    use crate::repo::{CategoryRepository, SupplierRepository};

    struct Fixture {
        catalog: Arc<InMemoryCatalogStore>,
        counters: Arc<InMemoryCounterStore>,
        products: ProductRepository,
        suppliers: SupplierRepository,
        categories: CategoryRepository,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let counters = Arc::new(InMemoryCounterStore::new());
        let manager = AggregateCounterManager::new(counters.clone(), CounterKeys::default());
        Fixture {
            products: ProductRepository::new(catalog.clone(), manager),
            suppliers: SupplierRepository::new(catalog.clone()),
            categories: CategoryRepository::new(catalog.clone()),
            catalog,
            counters,
        }
    }

    impl Fixture {
        async fn supplier(&self) -> Supplier {
            self.suppliers
                .create(NewSupplier {
                    name: "Acme".to_string(),
                    status: "active".to_string(),
                })
                .await
                .unwrap()
        }

        async fn category(&self) -> ProductCategory {
            self.categories
                .create(NewCategory {
                    name: "Tools".to_string(),
                    status: "active".to_string(),
                })
                .await
                .unwrap()
        }
    }

    fn draft(category: CategoryId, supplier: SupplierId) -> NewProduct {
        NewProduct {
            name: "Hammer".to_string(),
            reference: "HM".to_string(),
            status: "Available".to_string(),
            category_id: category.to_string(),
            price: 1200,
            stock_location: "Da Nang".to_string(),
            quantity: 4,
            supplier_id: supplier.to_string(),
        }
    }

    fn changes_for(product: &Product) -> ProductChanges {
        ProductChanges {
            product_id: product.id.to_string(),
            name: product.name.clone(),
            reference: product.reference.clone(),
            status: product.status.to_string(),
            category_id: product.category_id.to_string(),
            price: product.price,
            stock_location: product.stock_location.clone(),
            quantity: product.quantity,
            supplier_id: product.supplier_id.to_string(),
        }
    }

    #[tokio::test]
    async fn create_persists_row_and_counters() {
        let fx = fixture();
        let (s, c) = (fx.supplier().await, fx.category().await);
        let product = fx.products.create(draft(c.id, s.id)).await.unwrap();

        let detail = fx.products.get(product.id).await.unwrap();
        assert_eq!(detail.supplier, Some(s));
        assert_eq!(detail.product_category, Some(c));
        assert_eq!(fx.counters.value("a_product_total"), Some(1));
    }

    #[tokio::test]
    async fn unknown_supplier_fails_before_any_write() {
        let fx = fixture();
        let c = fx.category().await;
        let err = fx.products.create(draft(c.id, SupplierId::new())).await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidSupplier));
        assert_eq!(fx.catalog.product_count(), 0);
        assert!(fx.counters.snapshot().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_product_is_not_found() {
        let fx = fixture();
        let (s, c) = (fx.supplier().await, fx.category().await);
        let mut ghost = fx.products.create(draft(c.id, s.id)).await.unwrap();
        ghost.id = ProductId::new();
        let err = fx.products.update(changes_for(&ghost)).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn update_to_unknown_category_rolls_back() {
        let fx = fixture();
        let (s, c) = (fx.supplier().await, fx.category().await);
        let product = fx.products.create(draft(c.id, s.id)).await.unwrap();

        let mut changes = changes_for(&product);
        changes.name = "Renamed".to_string();
        changes.category_id = CategoryId::new().to_string();
        let err = fx.products.update(changes).await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidCategory));

        let stored = fx.products.get(product.id).await.unwrap();
        assert_eq!(stored.product.name, "Hammer");
        assert_eq!(fx.counters.batches_executed(), 1);
    }

    #[tokio::test]
    async fn counter_failure_on_update_keeps_old_row() {
        let fx = fixture();
        let (s, c1, c2) = (fx.supplier().await, fx.category().await, fx.category().await);
        let product = fx.products.create(draft(c1.id, s.id)).await.unwrap();

        fx.counters.fail_next_batches(1);
        let mut changes = changes_for(&product);
        changes.category_id = c2.id.to_string();
        let err = fx.products.update(changes).await.unwrap_err();
        assert!(matches!(err, RepoError::Counters(_)));
        assert_eq!(fx.products.get(product.id).await.unwrap().product.category_id, c1.id);
    }

    #[tokio::test]
    async fn search_with_unknown_filter_ids_is_empty() {
        let fx = fixture();
        let (s, c) = (fx.supplier().await, fx.category().await);
        fx.products.create(draft(c.id, s.id)).await.unwrap();

        let page = fx
            .products
            .search(ProductQuery {
                supplier_ids: vec![SupplierId::new()],
                ..ProductQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 0);

        let page = fx
            .products
            .search(ProductQuery {
                supplier_ids: vec![SupplierId::new(), s.id],
                ..ProductQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let fx = fixture();
        let (s, c) = (fx.supplier().await, fx.category().await);
        let products = fx.products.clone().with_timeout(Duration::from_millis(20));
        fx.catalog.set_latency(Some(Duration::from_millis(200)));

        let err = products.create(draft(c.id, s.id)).await.unwrap_err();
        assert!(matches!(err, RepoError::Timeout(_)));
        fx.catalog.set_latency(None);
        assert_eq!(fx.catalog.product_count(), 0);
        assert!(fx.counters.snapshot().is_empty());
    }

    #[tokio::test]
    async fn hanging_counter_store_fails_create_and_rolls_back() {
        let fx = fixture();
        let (s, c) = (fx.supplier().await, fx.category().await);
        let manager = AggregateCounterManager::new(fx.counters.clone(), CounterKeys::default())
            .with_op_timeout(Duration::from_millis(50));
        let products = ProductRepository::new(fx.catalog.clone(), manager);
        fx.counters.set_latency(Some(Duration::from_secs(3600)));

        let err = products.create(draft(c.id, s.id)).await.unwrap_err();
        assert!(matches!(err, RepoError::Counters(CounterError::Timeout)));
        fx.counters.set_latency(None);
        assert_eq!(fx.catalog.product_count(), 0);
        assert!(fx.counters.snapshot().is_empty());
    }

    #[tokio::test]
    async fn store_error_during_reference_check_is_reported() {
        let fx = fixture();
        let (s, c) = (fx.supplier().await, fx.category().await);
        fx.catalog.set_unavailable(true);

        let err = fx.products.create(draft(c.id, s.id)).await.unwrap_err();
        assert!(matches!(err, RepoError::Store(StoreError::Unavailable(_))));
        fx.catalog.set_unavailable(false);
        assert_eq!(fx.catalog.product_count(), 0);
        assert!(fx.counters.snapshot().is_empty());
    }
}
