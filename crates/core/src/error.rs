//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Which input a validation failure refers to.
///
/// The HTTP layer turns these into stable machine-readable codes, so the set
/// is closed rather than free-form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Reference,
    Status,
    Category,
    Supplier,
    Product,
    StockLocation,
    Date,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Reference => "reference",
            Field::Status => "status",
            Field::Category => "category",
            Field::Supplier => "supplier",
            Field::Product => "product",
            Field::StockLocation => "stock_location",
            Field::Date => "date",
        }
    }
}

impl core::fmt::Display for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a pure catalog rule. Store and cache failures have their own types
/// in the infrastructure crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("{field} is invalid: {message}")]
    Validation { field: Field, message: String },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(field: Field, msg: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: msg.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// The offending field, for validation failures.
    pub fn field(&self) -> Option<Field> {
        match self {
            DomainError::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_the_field() {
        let err = DomainError::validation(Field::StockLocation, "must not be empty");
        assert_eq!(err.to_string(), "stock_location is invalid: must not be empty");
        assert_eq!(err.field(), Some(Field::StockLocation));
    }

    #[test]
    fn non_validation_errors_have_no_field() {
        assert_eq!(DomainError::invariant("product_id mismatch").field(), None);
        assert_eq!(DomainError::invalid_id("ProductId: bad").field(), None);
    }
}
