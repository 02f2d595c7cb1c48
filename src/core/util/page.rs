use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i32 = 1;
pub const DEFAULT_PAGE_SIZE: i32 = 10;

/// Pagination descriptor returned with every list response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i32,
    pub page_size: i32,
    pub total: i32,
    pub pages: i32,
}

/// Build the descriptor for `total` post-filter items.
///
/// `page < 1` becomes 1, `page_size == 0` becomes 10, a negative `page_size` means
/// "all" and is emitted back as `-1`.
pub fn new_page(page: i32, page_size: i32, total: usize) -> Pagination {
    let page = if page < 1 { DEFAULT_PAGE } else { page };
    let total = total as i32;
    let (effective, emitted) = match page_size {
        0 => (DEFAULT_PAGE_SIZE, DEFAULT_PAGE_SIZE),
        n if n < 0 => (total, -1),
        n => (n, n),
    };

    Pagination {
        page,
        page_size: emitted,
        total,
        pages: calculate_pages(effective, total),
    }
}

pub fn calculate_pages(page_size: i32, total: i32) -> i32 {
    if page_size <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}

/// Start/end indices into a slice of `total` items for the requested page.
pub fn index_range(page: i32, page_size: i32, total: usize) -> (usize, usize) {
    let page = if page < 1 { DEFAULT_PAGE } else { page } as usize;
    let page_size = match page_size {
        0 => DEFAULT_PAGE_SIZE as usize,
        n if n < 0 => total,
        n => n as usize,
    };

    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);
    (start, end)
}

/// Cut one page out of `items`.
pub fn paged_items<T>(mut items: Vec<T>, page: i32, page_size: i32) -> Vec<T> {
    let (start, end) = index_range(page, page_size, items.len());
    items.truncate(end);
    items.drain(..start);
    items
}
