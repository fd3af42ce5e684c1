//! Postgres-backed catalog store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (other) | any other | `Unavailable` |
//! | PoolTimedOut | N/A | `Timeout` |
//! | ColumnDecode / Decode | N/A | `Corrupt` |
//! | Other | N/A | `Unavailable` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use stockroom_catalog::{
    CategoryQuery, Page, Pagination, Product, ProductCategory, ProductDetail, ProductQuery,
    ProductStatus, RecordStatus, Supplier, SupplierQuery,
};
use stockroom_core::{CategoryId, ProductId, SupplierId};

use super::{CatalogStore, CatalogTx, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

const PRODUCT_COLUMNS: &str = "p.product_id, p.product_name, p.product_reference, p.status, \
    p.product_category_id, p.price, p.stock_location, p.supplier_id, p.quantity, p.date_created";

const DETAIL_SELECT: &str = r#"
    SELECT
        p.product_id, p.product_name, p.product_reference, p.status,
        p.product_category_id, p.price, p.stock_location, p.supplier_id,
        p.quantity, p.date_created,
        s.supplier_id AS s_id, s.supplier_name AS s_name, s.status AS s_status,
        c.product_category_id AS c_id, c.product_category_name AS c_name,
        c.status AS c_status, c.created_at AS c_created_at, c.updated_at AS c_updated_at
    FROM product p
    LEFT JOIN supplier s ON s.supplier_id = p.supplier_id
    LEFT JOIN product_category c ON c.product_category_id = p.product_category_id
"#;

/// Postgres-backed catalog store.
///
/// `product_for_update` takes a row lock (`SELECT ... FOR UPDATE`), so concurrent
/// updates of the same product serialize on the database.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: PgPool,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        info!("catalog schema ready");
        Ok(())
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogTx for PostgresTx {
    async fn product_for_update(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product p WHERE p.product_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("product_for_update", e))?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO product (
                product_id, product_name, product_reference, status, product_category_id,
                price, stock_location, supplier_id, quantity, date_created
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.reference)
        .bind(product.status.as_str())
        .bind(*product.category_id.as_uuid())
        .bind(product.price)
        .bind(&product.stock_location)
        .bind(*product.supplier_id.as_uuid())
        .bind(product.quantity)
        .bind(product.date_created)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE product SET
                product_name = $2, product_reference = $3, status = $4, product_category_id = $5,
                price = $6, stock_location = $7, supplier_id = $8, quantity = $9
            WHERE product_id = $1
            "#,
        )
        .bind(*product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.reference)
        .bind(product.status.as_str())
        .bind(*product.category_id.as_uuid())
        .bind(product.price)
        .bind(&product.stock_location)
        .bind(*product.supplier_id.as_uuid())
        .bind(product.quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_product", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("product {} does not exist", product.id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn begin(&self) -> Result<Box<dyn CatalogTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx }))
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn product(&self, id: ProductId) -> Result<Option<ProductDetail>, StoreError> {
        let sql = format!("{DETAIL_SELECT} WHERE p.product_id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("product", e))?;
        row.as_ref().map(detail_from_row).transpose()
    }

    #[instrument(skip(self, query), err)]
    async fn search_products(&self, query: &ProductQuery) -> Result<Page<ProductDetail>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM product p");
        push_product_filters(&mut count, query);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_products", e))?
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_products", e))?;

        let mut select = QueryBuilder::<Postgres>::new(DETAIL_SELECT);
        push_product_filters(&mut select, query);
        if !query.pagination.is_unbounded() {
            select.push(" ORDER BY p.date_created DESC, p.product_id DESC");
        }
        push_window(&mut select, query.pagination);

        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("search_products", e))?;
        let data = rows.iter().map(detail_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(data, total.max(0) as u64, query.pagination))
    }

    async fn supplier(&self, id: SupplierId) -> Result<Option<Supplier>, StoreError> {
        let row = sqlx::query("SELECT supplier_id, supplier_name, status FROM supplier WHERE supplier_id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("supplier", e))?;
        row.as_ref().map(supplier_from_row).transpose()
    }

    async fn suppliers_by_ids(&self, ids: &[SupplierId]) -> Result<Vec<Supplier>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT supplier_id, supplier_name, status FROM supplier WHERE supplier_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("suppliers_by_ids", e))?;
        rows.iter().map(supplier_from_row).collect()
    }

    #[instrument(skip(self, query), err)]
    async fn search_suppliers(&self, query: &SupplierQuery) -> Result<Page<Supplier>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM supplier");
        push_name_status_filters(&mut count, "supplier_name", query.name.as_deref(), query.status);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_suppliers", e))?
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_suppliers", e))?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT supplier_id, supplier_name, status FROM supplier");
        push_name_status_filters(&mut select, "supplier_name", query.name.as_deref(), query.status);
        push_window(&mut select, query.pagination);
        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("search_suppliers", e))?;
        let data = rows.iter().map(supplier_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(data, total.max(0) as u64, query.pagination))
    }

    #[instrument(skip(self, supplier), fields(supplier_id = %supplier.id), err)]
    async fn insert_supplier(&self, supplier: &Supplier) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO supplier (supplier_id, supplier_name, status) VALUES ($1, $2, $3)")
            .bind(*supplier.id.as_uuid())
            .bind(&supplier.name)
            .bind(supplier.status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_supplier", e))?;
        Ok(())
    }

    async fn category(&self, id: CategoryId) -> Result<Option<ProductCategory>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_category_id, product_category_name, status, created_at, updated_at
            FROM product_category WHERE product_category_id = $1
            "#,
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("category", e))?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn categories_by_ids(&self, ids: &[CategoryId]) -> Result<Vec<ProductCategory>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT product_category_id, product_category_name, status, created_at, updated_at
            FROM product_category WHERE product_category_id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("categories_by_ids", e))?;
        rows.iter().map(category_from_row).collect()
    }

    #[instrument(skip(self, query), err)]
    async fn search_categories(&self, query: &CategoryQuery) -> Result<Page<ProductCategory>, StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM product_category");
        push_name_status_filters(&mut count, "product_category_name", query.name.as_deref(), query.status);
        let total: i64 = count
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_categories", e))?
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_categories", e))?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT product_category_id, product_category_name, status, created_at, updated_at FROM product_category",
        );
        push_name_status_filters(&mut select, "product_category_name", query.name.as_deref(), query.status);
        push_window(&mut select, query.pagination);
        let rows = select
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("search_categories", e))?;
        let data = rows.iter().map(category_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(data, total.max(0) as u64, query.pagination))
    }

    #[instrument(skip(self, category), fields(category_id = %category.id), err)]
    async fn insert_category(&self, category: &ProductCategory) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO product_category (product_category_id, product_category_name, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*category.id.as_uuid())
        .bind(&category.name)
        .bind(category.status.as_str())
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_category", e))?;
        Ok(())
    }
}

fn push_product_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if !q.names.is_empty() {
        qb.push(" AND p.product_name = ANY(").push_bind(q.names.clone()).push(")");
    }
    if !q.references.is_empty() {
        qb.push(" AND p.product_reference = ANY(").push_bind(q.references.clone()).push(")");
    }
    if !q.statuses.is_empty() {
        qb.push(" AND p.status = ANY(").push_bind(q.statuses.clone()).push(")");
    }
    if q.price_from > 0 {
        qb.push(" AND p.price >= ").push_bind(q.price_from);
    }
    if q.price_to > 0 {
        qb.push(" AND p.price <= ").push_bind(q.price_to);
    }
    if !q.stock_locations.is_empty() {
        qb.push(" AND p.stock_location = ANY(").push_bind(q.stock_locations.clone()).push(")");
    }
    if let Some(after) = q.created_after() {
        qb.push(" AND p.date_created >= ").push_bind(after);
    }
    if let Some(before) = q.created_before() {
        qb.push(" AND p.date_created < ").push_bind(before);
    }
    if !q.category_ids.is_empty() {
        let ids: Vec<Uuid> = q.category_ids.iter().map(|id| *id.as_uuid()).collect();
        qb.push(" AND p.product_category_id = ANY(").push_bind(ids).push(")");
    }
    if !q.supplier_ids.is_empty() {
        let ids: Vec<Uuid> = q.supplier_ids.iter().map(|id| *id.as_uuid()).collect();
        qb.push(" AND p.supplier_id = ANY(").push_bind(ids).push(")");
    }
}

fn push_name_status_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    name_column: &str,
    name: Option<&str>,
    status: Option<RecordStatus>,
) {
    qb.push(" WHERE TRUE");
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        qb.push(format!(" AND strpos({name_column}, "))
            .push_bind(name.to_string())
            .push(") > 0");
    }
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
}

fn push_window(qb: &mut QueryBuilder<'_, Postgres>, pagination: Pagination) {
    if pagination.limit > 0 {
        qb.push(" LIMIT ").push_bind(i64::from(pagination.limit));
    }
    if pagination.offset > 0 {
        qb.push(" OFFSET ").push_bind(i64::from(pagination.offset));
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let status: String = column(row, "status")?;
    Ok(Product {
        id: ProductId::from_uuid(column(row, "product_id")?),
        name: column(row, "product_name")?,
        reference: column(row, "product_reference")?,
        status: status
            .parse::<ProductStatus>()
            .map_err(|_| StoreError::Corrupt(format!("unknown product status {status:?}")))?,
        category_id: CategoryId::from_uuid(column(row, "product_category_id")?),
        price: column(row, "price")?,
        stock_location: column(row, "stock_location")?,
        supplier_id: SupplierId::from_uuid(column(row, "supplier_id")?),
        quantity: column(row, "quantity")?,
        date_created: column(row, "date_created")?,
    })
}

fn detail_from_row(row: &PgRow) -> Result<ProductDetail, StoreError> {
    let product = product_from_row(row)?;

    let supplier = match column::<Option<Uuid>>(row, "s_id")? {
        Some(id) => Some(Supplier {
            id: SupplierId::from_uuid(id),
            name: column(row, "s_name")?,
            status: record_status(column(row, "s_status")?)?,
        }),
        None => None,
    };
    let product_category = match column::<Option<Uuid>>(row, "c_id")? {
        Some(id) => Some(ProductCategory {
            id: CategoryId::from_uuid(id),
            name: column(row, "c_name")?,
            status: record_status(column(row, "c_status")?)?,
            created_at: column(row, "c_created_at")?,
            updated_at: column(row, "c_updated_at")?,
        }),
        None => None,
    };

    Ok(ProductDetail {
        product,
        supplier,
        product_category,
    })
}

fn supplier_from_row(row: &PgRow) -> Result<Supplier, StoreError> {
    Ok(Supplier {
        id: SupplierId::from_uuid(column(row, "supplier_id")?),
        name: column(row, "supplier_name")?,
        status: record_status(column(row, "status")?)?,
    })
}

fn category_from_row(row: &PgRow) -> Result<ProductCategory, StoreError> {
    Ok(ProductCategory {
        id: CategoryId::from_uuid(column(row, "product_category_id")?),
        name: column(row, "product_category_name")?,
        status: record_status(column(row, "status")?)?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
        updated_at: column::<DateTime<Utc>>(row, "updated_at")?,
    })
}

fn record_status(raw: String) -> Result<RecordStatus, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown record status {raw:?}")))
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::PoolTimedOut => StoreError::Timeout,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {}: {}", operation, err))
        }
        _ => StoreError::Unavailable(format!("sqlx error in {}: {}", operation, err)),
    }
}
