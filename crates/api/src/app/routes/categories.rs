use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use stockroom_catalog::{CategoryQuery, NewCategory};

use crate::app::dto::DefaultPage;
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_category))
        .route("/search", post(search_categories))
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewCategory>,
) -> axum::response::Response {
    match services.categories.create(body).await {
        Ok(category) => (StatusCode::CREATED, Json(category)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

pub async fn search_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CategoryQuery>,
) -> axum::response::Response {
    match services.categories.search(body.with_default_limit()).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}
