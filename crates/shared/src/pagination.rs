//! Range pagination utilities.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: i64 = 50;
pub const MAX_PER_PAGE: i64 = 200;

/// Page request as received from query strings (1-based page).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PER_PAGE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PageParams {
    /// Clamps page and size into their valid ranges.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    /// Returns `(limit, offset)` for a `LIMIT/OFFSET` query.
    pub fn limit_offset(self) -> (i64, i64) {
        let p = self.normalized();
        (p.per_page, (p.page - 1) * p.per_page)
    }
}

/// Pagination block included in list responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(params: PageParams, total: i64) -> Self {
        let p = params.normalized();
        Self {
            page: p.page,
            per_page: p.per_page,
            total,
            total_pages: (total + p.per_page - 1) / p.per_page,
        }
    }
}
