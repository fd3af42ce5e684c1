use axum::Router;

pub mod categories;
pub mod products;
pub mod statistics;
pub mod suppliers;
pub mod system;

/// Router for all catalog endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/suppliers", suppliers::router())
        .nest("/categories", categories::router())
        .nest("/statistics", statistics::router())
}
