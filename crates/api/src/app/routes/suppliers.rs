use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use stockroom_catalog::{NewSupplier, SupplierQuery};

use crate::app::dto::DefaultPage;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_supplier))
        .route("/search", post(search_suppliers))
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewSupplier>,
) -> axum::response::Response {
    match services.suppliers.create(body).await {
        Ok(supplier) => (StatusCode::CREATED, Json(supplier)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

pub async fn search_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<SupplierQuery>,
) -> axum::response::Response {
    match services.suppliers.search(body.with_default_limit()).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}
