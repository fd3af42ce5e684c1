use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/products-per-category", get(products_per_category))
        .route("/products-per-supplier", get(products_per_supplier))
}

pub async fn products_per_category(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.products.percentage_per_category().await {
        Ok(percentages) => (
            StatusCode::OK,
            Json(dto::BreakdownResponse {
                dimension: "category",
                percentages,
            }),
        )
            .into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

pub async fn products_per_supplier(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.products.percentage_per_supplier().await {
        Ok(percentages) => (
            StatusCode::OK,
            Json(dto::BreakdownResponse {
                dimension: "supplier",
                percentages,
            }),
        )
            .into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}
