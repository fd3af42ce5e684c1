//! Repositories: validation, fan-out reference checks, transactions and counter
//! maintenance composed into the operations the HTTP layer calls.

mod fanout;
pub mod category;
pub mod product;
pub mod supplier;

use std::future::Future;
use std::time::Duration;

use stockroom_core::DomainError;

use crate::counters::CounterError;
use crate::store::StoreError;

pub use category::CategoryRepository;
pub use product::ProductRepository;
pub use supplier::SupplierRepository;

/// Default bound on a whole repository operation.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("invalid supplier")]
    InvalidSupplier,

    #[error("invalid product category")]
    InvalidCategory,

    #[error("product not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Counters(#[from] CounterError),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Run `op` under `limit`. On expiry the operation future is dropped, which rolls back
/// any transaction it holds.
pub(crate) async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = Result<T, RepoError>>,
) -> Result<T, RepoError> {
    tokio::time::timeout(limit, op)
        .await
        .unwrap_or(Err(RepoError::Timeout(limit)))
}
