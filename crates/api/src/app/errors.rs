use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockroom_core::{DomainError, Field};
use stockroom_infra::{CounterError, RepoError, StoreError};

pub fn repo_error_to_response(err: RepoError) -> axum::response::Response {
    match err {
        RepoError::Validation(e) => domain_error_to_response(e),
        RepoError::InvalidSupplier => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_supplier",
            "supplier does not exist",
        ),
        RepoError::InvalidCategory => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_category",
            "product category does not exist",
        ),
        RepoError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        RepoError::Store(StoreError::Conflict(msg)) => json_error(StatusCode::CONFLICT, "conflict", msg),
        RepoError::Store(StoreError::Timeout) | RepoError::Counters(CounterError::Timeout) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "timeout",
            "backing store did not answer in time",
        ),
        RepoError::Store(e) => json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string()),
        RepoError::Counters(e) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "counter_unavailable", e.to_string())
        }
        RepoError::Timeout(limit) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "timeout",
            format!("operation did not finish within {}s", limit.as_secs_f32()),
        ),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation { field, .. } => {
            json_error(StatusCode::BAD_REQUEST, validation_code(field), err.to_string())
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
    }
}

fn validation_code(field: Field) -> &'static str {
    match field {
        Field::Name => "invalid_name",
        Field::Reference => "invalid_reference",
        Field::Status => "invalid_status",
        Field::Category => "invalid_category",
        Field::Supplier => "invalid_supplier",
        Field::Product => "invalid_product",
        Field::StockLocation => "invalid_stock_location",
        Field::Date => "invalid_date",
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
