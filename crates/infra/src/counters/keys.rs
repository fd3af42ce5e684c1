use core::fmt;

/// Reference dimension a per-dimension counter is kept for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dimension {
    Category,
    Supplier,
}

impl Dimension {
    fn segment(self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Supplier => "supplier",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Default key prefix.
pub const DEFAULT_PREFIX: &str = "a";

/// Naming scheme for counter keys.
///
/// With the default prefix `a`:
///
/// | Counter | Key |
/// |---------|-----|
/// | products in category `C` | `a_category_products:C` |
/// | products from supplier `S` | `a_supplier_products:S` |
/// | all products | `a_product_total` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterKeys {
    prefix: String,
}

impl Default for CounterKeys {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl CounterKeys {
    /// The prefix must not contain `:` or glob metacharacters; see [`CounterKeys::is_valid_prefix`].
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn is_valid_prefix(prefix: &str) -> bool {
        !prefix.is_empty()
            && !prefix
                .chars()
                .any(|c| matches!(c, ':' | '*' | '?' | '[' | ']' | '\\') || c.is_whitespace())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn dimension_prefix(&self, dimension: Dimension) -> String {
        format!("{}_{}_products:", self.prefix, dimension.segment())
    }

    pub fn counter(&self, dimension: Dimension, id: &impl fmt::Display) -> String {
        format!("{}{}", self.dimension_prefix(dimension), id)
    }

    pub fn total(&self) -> String {
        format!("{}_product_total", self.prefix)
    }

    pub fn scan_pattern(&self, dimension: Dimension) -> String {
        format!("{}*", self.dimension_prefix(dimension))
    }

    /// Extract the identifier from a per-dimension key.
    ///
    /// `None` for keys of another dimension and for malformed keys (empty id, or an
    /// id that itself contains `:`).
    pub fn parse_id<'k>(&self, dimension: Dimension, key: &'k str) -> Option<&'k str> {
        let id = key.strip_prefix(self.dimension_prefix(dimension).as_str())?;
        if id.is_empty() || id.contains(':') {
            return None;
        }
        Some(id)
    }
}
