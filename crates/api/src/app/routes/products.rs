use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockroom_catalog::{NewProduct, ProductSearch};
use stockroom_core::{DomainError, Field, ProductId};

use crate::app::dto::{self, DefaultPage};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product))
        .route("/search", post(search_products))
        .route("/:id", get(get_product).put(update_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NewProduct>,
) -> axum::response::Response {
    match services.products.create(body).await {
        Ok(product) => (StatusCode::CREATED, Json(product)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ProductSearch>,
) -> axum::response::Response {
    let query = match body.with_default_limit().validate() {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };
    match services.products.search(query).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match id.parse::<ProductId>() {
        Ok(id) => id,
        Err(_) => {
            return errors::domain_error_to_response(DomainError::validation(
                Field::Product,
                "product id must be a UUID",
            ))
        }
    };
    match services.products.get(id).await {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> axum::response::Response {
    match services.products.update(body.into_changes(id)).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::repo_error_to_response(e),
    }
}
