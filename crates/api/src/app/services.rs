//! Store and repository wiring.

use std::sync::Arc;

use stockroom_infra::{
    AggregateCounterManager, CatalogStore, CategoryRepository, CounterError, CounterKeys,
    CounterStore, InMemoryCatalogStore, InMemoryCounterStore, ProductRepository, StoreError,
    SupplierRepository,
};

use crate::config::AppConfig;

/// Repositories shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub products: ProductRepository,
    pub suppliers: SupplierRepository,
    pub categories: CategoryRepository,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("relational store: {0}")]
    Store(#[from] StoreError),

    #[error("counter cache: {0}")]
    Counters(#[from] CounterError),
}

impl AppServices {
    pub fn from_stores(
        catalog: Arc<dyn CatalogStore>,
        counters: Arc<dyn CounterStore>,
        config: &AppConfig,
    ) -> Self {
        let manager = AggregateCounterManager::new(counters, CounterKeys::new(config.counter_key_prefix.clone()))
            .with_scan_batch(config.counter_scan_batch)
            .with_op_timeout(config.store_timeout);
        Self {
            products: ProductRepository::new(catalog.clone(), manager).with_timeout(config.store_timeout),
            suppliers: SupplierRepository::new(catalog.clone()).with_timeout(config.store_timeout),
            categories: CategoryRepository::new(catalog).with_timeout(config.store_timeout),
        }
    }

    /// In-memory stores (dev/test).
    pub fn in_memory(config: &AppConfig) -> Self {
        Self::from_stores(
            Arc::new(InMemoryCatalogStore::new()),
            Arc::new(InMemoryCounterStore::new()),
            config,
        )
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    if config.use_persistent_stores {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services(config).await;
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
            return Ok(AppServices::in_memory(config));
        }
    }

    Ok(AppServices::in_memory(config))
}

#[cfg(feature = "redis")]
async fn build_persistent_services(config: &AppConfig) -> Result<AppServices, ServiceError> {
    use stockroom_infra::PostgresCatalogStore;
    use stockroom_infra::counters::RedisCounterStore;

    let database_url = config.database_url.as_deref().unwrap_or_default();
    let catalog = PostgresCatalogStore::connect(
        database_url,
        config.database_max_connections,
        config.store_timeout,
    )
    .await?;
    catalog.ensure_schema().await?;

    let counters = RedisCounterStore::connect(&config.redis_url).await?;
    tracing::info!(redis_url = %config.redis_url, "connected to postgres and redis");

    Ok(AppServices::from_stores(Arc::new(catalog), Arc::new(counters), config))
}
