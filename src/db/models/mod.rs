use serde::{Deserialize, Serialize};

pub mod account;
pub mod ledger;
pub mod quiz;
pub mod worksheet;

#[inline]
const fn default_offset() -> i64 {
    0
}

#[inline]
const fn default_limit() -> i64 {
    50
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default = "default_offset")]
    pub page: i64,
}

impl Pagination {
    /// `(limit, offset)` safe to splice into a query: a non-positive limit
    /// becomes 1 and a negative page becomes 0, so query-string garbage like
    /// `limit=-1` cannot reach the database or zero a later division.
    pub fn clamped(&self) -> (i64, i64) {
        let limit = self.limit.max(1);
        (limit, self.page.max(0) * limit)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub total_items: i64,
    pub total_pages: i64,
    #[serde(default = "default_limit")]
    pub page_size: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total_items: i64, page_size: i64, page: i64) -> Self {
        let total_pages = (total_items as f64 / page_size as f64).ceil() as i64;
        Self {
            items,
            page,
            page_size,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamped_passes_sane_params_through() {
        let param = Pagination { limit: 25, page: 3 };
        assert_eq!(param.clamped(), (25, 75));
    }

    #[test]
    fn test_clamped_rejects_hostile_params() {
        let negative = Pagination { limit: -1, page: 0 };
        assert_eq!(negative.clamped(), (1, 0));

        let zero = Pagination { limit: 0, page: 2 };
        assert_eq!(zero.clamped(), (1, 2));

        let back_page = Pagination { limit: 50, page: -4 };
        assert_eq!(back_page.clamped(), (50, 0));
    }
}
