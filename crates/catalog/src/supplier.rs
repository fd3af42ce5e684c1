use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, Entity, Field, SupplierId};

use crate::status::RecordStatus;

/// A supplier products are sourced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    #[serde(rename = "supplier_id")]
    pub id: SupplierId,
    #[serde(rename = "supplier_name")]
    pub name: String,
    pub status: RecordStatus,
}

impl Entity for Supplier {
    type Id = SupplierId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Unvalidated supplier creation input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewSupplier {
    #[serde(default, rename = "supplier_name")]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl NewSupplier {
    /// Validate the draft and build the supplier row it describes.
    pub fn into_supplier(self, id: SupplierId) -> DomainResult<Supplier> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation(Field::Name, "supplier name cannot be empty"));
        }
        let status: RecordStatus = self.status.parse()?;

        Ok(Supplier {
            id,
            name: self.name,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_supplier_from_valid_draft() {
        let id = SupplierId::new();
        let supplier = NewSupplier {
            name: "Acme".to_string(),
            status: "active".to_string(),
        }
        .into_supplier(id)
        .unwrap();

        assert_eq!(supplier.id, id);
        assert_eq!(supplier.status, RecordStatus::Active);
    }

    #[test]
    fn empty_name_is_rejected_before_status() {
        let err = NewSupplier {
            name: "  ".to_string(),
            status: "bogus".to_string(),
        }
        .into_supplier(SupplierId::new())
        .unwrap_err();
        assert_eq!(err.field(), Some(Field::Name));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = NewSupplier {
            name: "Acme".to_string(),
            status: "suspended".to_string(),
        }
        .into_supplier(SupplierId::new())
        .unwrap_err();
        assert_eq!(err.field(), Some(Field::Status));
    }
}
