use serde::Deserialize;

const MAX_PER_PAGE: u32 = 20;
const DEFAULT_PER_PAGE: u32 = 10;

/// 1-based page window over the movie list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    /// Page is at least 1; per page is clamped to 1..=20.
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page: page.max(1), per_page: per_page.clamp(1, MAX_PER_PAGE) }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Ceiling division of `total` by the page size.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(self.limit())
    }

    /// Link to the previous page, absent on the first.
    pub fn prev_link(&self, base: &str) -> Option<String> {
        (self.page > 1).then(|| self.link(base, self.page - 1))
    }

    /// Link to the next page, absent once `page` reaches the last page.
    pub fn next_link(&self, base: &str, total: u64) -> Option<String> {
        (u64::from(self.page) < self.page_count(total)).then(|| self.link(base, self.page + 1))
    }

    fn link(&self, base: &str, page: u32) -> String {
        format!("{base}?page={page}&per_page={}", self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, per_page: DEFAULT_PER_PAGE }
    }
}

/// `?page=&per_page=` query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(params.page.unwrap_or(1), params.per_page.unwrap_or(DEFAULT_PER_PAGE))
    }
}
