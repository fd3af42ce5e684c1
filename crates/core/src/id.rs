//! Strongly-typed identifiers used across the catalog.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a product row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(Uuid);

/// Identifier of a supplier row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(Uuid);

/// Identifier of a product category row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(Uuid);

// `new` is UUIDv7, so ids roughly follow creation time.
macro_rules! uuid_id {
    ($t:ident) => {
        impl $t {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        /// Hyphenated lowercase form, which is also the suffix of its counter keys.
        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0.hyphenated(), f)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {e}", stringify!($t))))
            }
        }
    };
}

uuid_id!(ProductId);
uuid_id!(SupplierId);
uuid_id!(CategoryId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase_hyphenated() {
        let id: SupplierId = "6F1C1D2E-8A8E-4C57-9D57-2B0F3B4D5E6F".parse().unwrap();
        assert_eq!(id.to_string(), "6f1c1d2e-8a8e-4c57-9d57-2b0f3b4d5e6f");
    }

    #[test]
    fn parse_failure_names_the_type() {
        let err = "not-a-uuid".parse::<CategoryId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("CategoryId:")),
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }

    #[test]
    fn new_ids_are_version_7() {
        assert_eq!(ProductId::new().as_uuid().get_version_num(), 7);
        assert_ne!(CategoryId::new(), CategoryId::new());
    }
}
