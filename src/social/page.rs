use serde::Deserialize;
use utoipa::IntoParams;

const DEFAULT_PER_PAGE: u64 = 20;
const MAX_PER_PAGE: u64 = 100;
const MAX_OFFSET: u64 = i64::MAX as u64;

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

/// Pagination of list endpoints.
///
/// Pages start at `1`, `per_page` is clamped to `1..=100`.
#[derive(Deserialize, IntoParams, Copy, Clone, Debug)]
#[into_params(parameter_in = Query)]
pub struct Page {
    #[serde(default = "default_page")]
    #[param(example = 1)]
    page: u64,
    #[serde(default = "default_per_page")]
    #[param(example = 20)]
    per_page: u64,
}

impl Page {
    /// Create a new page
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// The count of entries on a page
    pub fn limit(&self) -> u64 {
        self.per_page.clamp(1, MAX_PER_PAGE)
    }

    /// The count of entries before this page.
    ///
    /// Never exceeds `i64::MAX`, the largest offset the database accepts.
    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1)
            .saturating_mul(self.limit())
            .min(MAX_OFFSET)
    }

    /// Cut this page out of `items`
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.limit() as usize)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(default_page(), DEFAULT_PER_PAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_one_based() {
        assert_eq!(Page::new(1, 10).offset(), 0);
        assert_eq!(Page::new(3, 10).offset(), 20);
        assert_eq!(Page::new(0, 10).offset(), 0);
    }

    #[test]
    fn per_page_is_clamped() {
        assert_eq!(Page::new(1, 0).limit(), 1);
        assert_eq!(Page::new(1, 1000).limit(), MAX_PER_PAGE);
    }

    #[test]
    fn huge_pages_do_not_overflow() {
        assert_eq!(Page::new(u64::MAX, 100).offset(), MAX_OFFSET);
        assert_eq!(Page::new(u64::MAX, 1).offset(), MAX_OFFSET);
        assert!(Page::new(u64::MAX, 100).slice(1..=8).is_empty());
    }

    #[test]
    fn slice() {
        let page = Page::new(2, 3);
        assert_eq!(page.slice(1..=8), vec![4, 5, 6]);
        assert_eq!(Page::new(3, 3).slice(1..=8), vec![7, 8]);
        assert!(Page::new(4, 3).slice(1..=8).is_empty());
    }
}
