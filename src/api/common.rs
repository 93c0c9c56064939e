//! Common API utilities and shared types

use serde::Deserialize;

use crate::models::{ListParams, DEFAULT_PER_PAGE};

/// Default page number (1-indexed)
pub fn default_page() -> u32 {
    1
}

pub fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

/// Pagination query parameters.
///
/// Extracted on its own next to the endpoint's filter query; both read the
/// same query string and ignore each other's keys.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl PaginationQuery {
    /// Out-of-range values are clamped
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MAX_PER_PAGE;

    #[test]
    fn test_pagination_defaults() {
        let query: PaginationQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.params(), ListParams::default());
    }

    #[test]
    fn test_pagination_clamps() {
        let query = PaginationQuery { page: 0, per_page: 10_000 };
        let params = query.params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, MAX_PER_PAGE);
    }
}
