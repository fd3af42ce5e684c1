use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, Field};

/// Stock status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductStatus {
    #[serde(rename = "Available")]
    Available,
    #[serde(rename = "On Order")]
    OnOrder,
    #[serde(rename = "Out of Stock")]
    OutOfStock,
}

impl ProductStatus {
    pub const ALL: [ProductStatus; 3] = [
        ProductStatus::Available,
        ProductStatus::OnOrder,
        ProductStatus::OutOfStock,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Available => "Available",
            ProductStatus::OnOrder => "On Order",
            ProductStatus::OutOfStock => "Out of Stock",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(
                    Field::Status,
                    "must be one of: Available, On Order, Out of Stock",
                )
            })
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity status shared by suppliers and categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "in active")]
    Inactive,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Inactive => "in active",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RecordStatus::Active),
            "in active" => Ok(RecordStatus::Inactive),
            _ => Err(DomainError::validation(
                Field::Status,
                "must be one of: active, in active",
            )),
        }
    }
}

impl core::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_status_uses_display_strings_on_the_wire() {
        let json = serde_json::to_string(&ProductStatus::OutOfStock).unwrap();
        assert_eq!(json, "\"Out of Stock\"");
        assert_eq!("On Order".parse::<ProductStatus>().unwrap(), ProductStatus::OnOrder);
    }

    #[test]
    fn status_parsing_is_case_sensitive() {
        assert!("available".parse::<ProductStatus>().is_err());
        assert!("Active".parse::<RecordStatus>().is_err());
        assert_eq!("in active".parse::<RecordStatus>().unwrap(), RecordStatus::Inactive);
    }
}
