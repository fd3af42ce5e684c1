//! Search filters and pagination.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, Field, SupplierId};

use crate::category::ProductCategory;
use crate::product::Product;
use crate::status::RecordStatus;
use crate::supplier::Supplier;

/// Page size used when a search does not ask for one.
pub const DEFAULT_LIMIT: u32 = 20;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Offset/limit window. A zero limit means "no limit".
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Replace a missing limit with [`DEFAULT_LIMIT`].
    pub fn or_default_limit(self) -> Self {
        if self.limit == 0 {
            Self {
                limit: DEFAULT_LIMIT,
                ..self
            }
        } else {
            self
        }
    }

    /// `limit = 0 && offset = 0`: return everything, in storage order.
    pub fn is_unbounded(&self) -> bool {
        self.limit == 0 && self.offset == 0
    }

    /// Apply the window to an already-filtered, already-ordered sequence.
    pub fn window<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset as usize);
        if self.limit == 0 {
            iter.collect()
        } else {
            iter.take(self.limit as usize).collect()
        }
    }
}

/// One page of search results plus the unpaginated match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            data,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }

    pub fn empty(pagination: Pagination) -> Self {
        Self::new(Vec::new(), 0, pagination)
    }
}

/// Raw product search request, as bound from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductSearch {
    #[serde(default)]
    pub product_references: Vec<String>,
    #[serde(default)]
    pub product_names: Vec<String>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub product_category_ids: Vec<String>,
    #[serde(default)]
    pub supplier_ids: Vec<String>,
    #[serde(default)]
    pub price_from: i64,
    #[serde(default)]
    pub price_to: i64,
    #[serde(default)]
    pub stock_locations: Vec<String>,
    #[serde(default)]
    pub date_created_from: String,
    #[serde(default)]
    pub date_created_to: String,
    #[serde(flatten)]
    pub pagination: Pagination,
}

/// Validated product search filters.
///
/// Empty lists and zero prices mean "no filter" for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub references: Vec<String>,
    pub names: Vec<String>,
    pub statuses: Vec<String>,
    pub category_ids: Vec<CategoryId>,
    pub supplier_ids: Vec<SupplierId>,
    pub price_from: i64,
    pub price_to: i64,
    pub stock_locations: Vec<String>,
    pub created_from: Option<NaiveDate>,
    pub created_to: Option<NaiveDate>,
    pub pagination: Pagination,
}

impl ProductSearch {
    /// Validate dates and convert identifiers.
    ///
    /// Category/supplier ids that are not UUIDs are dropped, not rejected.
    pub fn validate(self) -> DomainResult<ProductQuery> {
        let created_from = parse_date(&self.date_created_from)?;
        let created_to = parse_date(&self.date_created_to)?;
        if let (Some(from), Some(to)) = (created_from, created_to) {
            if from > to {
                return Err(DomainError::validation(
                    Field::Date,
                    "date_created_from is after date_created_to",
                ));
            }
        }

        Ok(ProductQuery {
            references: self.product_references,
            names: self.product_names,
            statuses: self.status,
            category_ids: self
                .product_category_ids
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect(),
            supplier_ids: self.supplier_ids.iter().filter_map(|s| s.parse().ok()).collect(),
            price_from: self.price_from,
            price_to: self.price_to,
            stock_locations: self.stock_locations,
            created_from,
            created_to,
            pagination: self.pagination,
        })
    }
}

fn parse_date(raw: &str) -> DomainResult<Option<NaiveDate>> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| DomainError::validation(Field::Date, format!("expected YYYY-MM-DD, got {raw:?}")))
}

impl ProductQuery {
    /// Inclusive lower bound on `date_created`.
    pub fn created_after(&self) -> Option<DateTime<Utc>> {
        self.created_from
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    /// Exclusive upper bound on `date_created` (the whole `created_to` day is included).
    pub fn created_before(&self) -> Option<DateTime<Utc>> {
        self.created_to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }

    pub fn matches(&self, p: &Product) -> bool {
        if !self.names.is_empty() && !self.names.contains(&p.name) {
            return false;
        }
        if !self.references.is_empty() && !self.references.contains(&p.reference) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.iter().any(|s| s == p.status.as_str()) {
            return false;
        }
        if self.price_from > 0 && p.price < self.price_from {
            return false;
        }
        if self.price_to > 0 && p.price > self.price_to {
            return false;
        }
        if !self.stock_locations.is_empty() && !self.stock_locations.contains(&p.stock_location) {
            return false;
        }
        if let Some(after) = self.created_after() {
            if p.date_created < after {
                return false;
            }
        }
        if let Some(before) = self.created_before() {
            if p.date_created >= before {
                return false;
            }
        }
        if !self.category_ids.is_empty() && !self.category_ids.contains(&p.category_id) {
            return false;
        }
        if !self.supplier_ids.is_empty() && !self.supplier_ids.contains(&p.supplier_id) {
            return false;
        }
        true
    }
}

/// Supplier search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SupplierQuery {
    #[serde(default, rename = "supplier_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

impl SupplierQuery {
    pub fn matches(&self, s: &Supplier) -> bool {
        name_matches(self.name.as_deref(), &s.name) && self.status.is_none_or(|st| st == s.status)
    }
}

/// Category search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryQuery {
    #[serde(default, rename = "product_category_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<RecordStatus>,
    #[serde(flatten)]
    pub pagination: Pagination,
}

impl CategoryQuery {
    pub fn matches(&self, c: &ProductCategory) -> bool {
        name_matches(self.name.as_deref(), &c.name) && self.status.is_none_or(|st| st == c.status)
    }
}

fn name_matches(filter: Option<&str>, name: &str) -> bool {
    match filter {
        None | Some("") => true,
        Some(needle) => name.contains(needle),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use stockroom_core::ProductId;

    use crate::status::ProductStatus;

    fn product_on(day: u32) -> Product {
        Product {
            id: ProductId::new(),
            name: "Widget".to_string(),
            reference: "PROD-202405-1".to_string(),
            status: ProductStatus::Available,
            category_id: CategoryId::new(),
            price: 500,
            stock_location: "Hanoi".to_string(),
            supplier_id: SupplierId::new(),
            quantity: 1,
            date_created: Utc.with_ymd_and_hms(2024, 5, day, 18, 30, 0).unwrap(),
        }
    }

    #[test]
    fn rejects_inverted_date_range() {
        let search = ProductSearch {
            date_created_from: "2024-05-02".to_string(),
            date_created_to: "2024-05-01".to_string(),
            ..ProductSearch::default()
        };
        assert_eq!(search.validate().unwrap_err().field(), Some(Field::Date));
    }

    #[test]
    fn rejects_malformed_date() {
        let search = ProductSearch {
            date_created_from: "05/01/2024".to_string(),
            ..ProductSearch::default()
        };
        assert_eq!(search.validate().unwrap_err().field(), Some(Field::Date));
    }

    #[test]
    fn drops_unparseable_reference_ids() {
        let good = CategoryId::new();
        let search = ProductSearch {
            product_category_ids: vec!["junk".to_string(), good.to_string()],
            supplier_ids: vec!["also-junk".to_string()],
            ..ProductSearch::default()
        };
        let query = search.validate().unwrap();
        assert_eq!(query.category_ids, vec![good]);
        assert!(query.supplier_ids.is_empty());
    }

    #[test]
    fn date_to_includes_the_whole_day() {
        let query = ProductQuery {
            created_from: NaiveDate::from_ymd_opt(2024, 5, 2),
            created_to: NaiveDate::from_ymd_opt(2024, 5, 3),
            ..ProductQuery::default()
        };
        assert!(!query.matches(&product_on(1)));
        assert!(query.matches(&product_on(2)));
        assert!(query.matches(&product_on(3)));
        assert!(!query.matches(&product_on(4)));
    }

    #[test]
    fn zero_prices_do_not_filter() {
        let mut query = ProductQuery::default();
        assert!(query.matches(&product_on(1)));
        query.price_to = 499;
        assert!(!query.matches(&product_on(1)));
        query.price_to = 0;
        query.price_from = 501;
        assert!(!query.matches(&product_on(1)));
    }

    #[test]
    fn status_filter_compares_wire_strings() {
        let query = ProductQuery {
            statuses: vec!["On Order".to_string(), "Available".to_string()],
            ..ProductQuery::default()
        };
        assert!(query.matches(&product_on(1)));
    }

    #[test]
    fn window_skips_then_takes() {
        let p = Pagination::new(2, 1);
        assert_eq!(p.window(1..=5), vec![2, 3]);
        assert_eq!(Pagination::default().window(1..=3), vec![1, 2, 3]);
        assert_eq!(Pagination::default().or_default_limit().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn supplier_name_filter_is_substring() {
        let supplier = Supplier {
            id: SupplierId::new(),
            name: "Acme Trading".to_string(),
            status: RecordStatus::Active,
        };
        let mut q = SupplierQuery {
            name: Some("Trad".to_string()),
            ..SupplierQuery::default()
        };
        assert!(q.matches(&supplier));
        q.status = Some(RecordStatus::Inactive);
        assert!(!q.matches(&supplier));
    }
}
