//! Pagination over the filtered analysis list

/// Rows per page in paginated mode
pub const PAGE_SIZE: usize = 10;

/// Rows shown in recent mode
pub const RECENT_PREVIEW: usize = 5;

/// Window into a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: usize,
    /// Total number of pages (0 for an empty set)
    pub total_pages: usize,
    /// Index of the first row on the page
    pub offset: usize,
}

impl Pagination {
    /// Row range of this page within a set of `total_results` rows
    pub fn range(&self, total_results: usize) -> std::ops::Range<usize> {
        let start = self.offset.min(total_results);
        let end = (self.offset + PAGE_SIZE).min(total_results);
        start..end
    }

    /// Whether `page + delta` stays within `[1, total_pages]`
    pub fn accepts(&self, delta: i64) -> Option<usize> {
        let target = self.page as i64 + delta;
        (target >= 1 && target <= self.total_pages as i64).then_some(target as usize)
    }
}

/// Calculate pagination metadata, clamping the page into `[1, total_pages]`
///
/// # Examples
/// ```
/// use mpol_dash::results::pagination::calculate_pagination;
///
/// // 25 results = 3 pages (10 + 10 + 5)
/// let p = calculate_pagination(25, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 10);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(25, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 20);
/// ```
pub fn calculate_pagination(total_results: usize, requested_page: usize) -> Pagination {
    let total_pages = total_results.div_ceil(PAGE_SIZE);
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * PAGE_SIZE;

    Pagination {
        page,
        total_pages,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(25, 2);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 10);
        assert_eq!(p.range(25), 10..20);
    }

    #[test]
    fn test_pagination_last_partial_page() {
        let p = calculate_pagination(12, 2);
        assert_eq!(p.range(12), 10..12);
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(15, 0);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 1);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.range(0), 0..0);
        assert_eq!(p.accepts(1), None);
        assert_eq!(p.accepts(0), None);
    }

    #[test]
    fn test_pagination_exact_page_boundary() {
        let p = calculate_pagination(20, 2);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.range(20), 10..20);
    }

    #[test]
    fn test_accepts_bounds() {
        let p = calculate_pagination(12, 2);
        assert_eq!(p.accepts(1), None);
        assert_eq!(p.accepts(-1), Some(1));
        assert_eq!(p.accepts(-2), None);
    }
}
