use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument};

use stockroom_catalog::{CategoryQuery, NewCategory, Page, ProductCategory};
use stockroom_core::CategoryId;

use crate::store::CatalogStore;

use super::{DEFAULT_REQUEST_TIMEOUT, RepoError, bounded};

#[derive(Clone)]
pub struct CategoryRepository {
    store: Arc<dyn CatalogStore>,
    timeout: Duration,
}

impl CategoryRepository {
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
    pub async fn create(&self, draft: NewCategory) -> Result<ProductCategory, RepoError> {
        let category = draft.into_category(CategoryId::new(), Utc::now())?;
        bounded(self.timeout, async {
            self.store.insert_category(&category).await.map_err(RepoError::from)
        })
        .await?;
        info!(category_id = %category.id, "product category created");
        Ok(category)
    }

    pub async fn get(&self, id: CategoryId) -> Result<Option<ProductCategory>, RepoError> {
        bounded(self.timeout, async { self.store.category(id).await.map_err(RepoError::from) }).await
    }

    /// The subset of `ids` that exist.
    pub async fn get_many(&self, ids: &[CategoryId]) -> Result<Vec<ProductCategory>, RepoError> {
        bounded(self.timeout, async {
            self.store.categories_by_ids(ids).await.map_err(RepoError::from)
        })
        .await
    }

    #[instrument(skip(self, query), err)]
    pub async fn search(&self, query: CategoryQuery) -> Result<Page<ProductCategory>, RepoError> {
        bounded(self.timeout, async {
            self.store.search_categories(&query).await.map_err(RepoError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCatalogStore;

    #[tokio::test]
    async fn name_filter_matches_substrings() {
        let repo = CategoryRepository::new(Arc::new(InMemoryCatalogStore::new()));
        for name in ["Cold Drinks", "Hot Drinks", "Snacks"] {
            repo.create(NewCategory {
                name: name.to_string(),
                status: "active".to_string(),
            })
            .await
            .unwrap();
        }
        let page = repo
            .search(CategoryQuery {
                name: Some("Drinks".to_string()),
                ..CategoryQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn get_many_skips_unknown_ids() {
        let repo = CategoryRepository::new(Arc::new(InMemoryCatalogStore::new()));
        let created = repo
            .create(NewCategory {
                name: "Snacks".to_string(),
                status: "active".to_string(),
            })
            .await
            .unwrap();
        let found = repo.get_many(&[CategoryId::new(), created.id]).await.unwrap();
        assert_eq!(found, vec![created]);
    }
}
