use crate::config::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE};

/// Raw, caller-supplied pagination options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PaginationParams {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

/// Validated page window; `page_number` starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_number: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn resolve(params: PaginationParams, limits: PageLimits) -> Self {
        let page_number = params
            .page
            .filter(|page| *page >= 1)
            .map(|page| page.min(u32::MAX as i64) as u32)
            .unwrap_or(1);

        let max_page_size = limits.max_page_size.max(1);
        let page_size = params
            .page_size
            .filter(|size| *size >= 1)
            .map(|size| size.min(max_page_size as i64) as u32)
            .unwrap_or_else(|| limits.default_page_size.clamp(1, max_page_size));

        Self {
            page_number,
            page_size,
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page_number as i64 - 1) * self.page_size as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub entries: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_entries: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(entries: Vec<T>, request: PageRequest, total_entries: u64) -> Self {
        Self {
            entries,
            page_number: request.page_number,
            page_size: request.page_size,
            total_entries,
            total_pages: total_pages(total_entries, request.page_size),
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            entries: self.entries.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_entries: self.total_entries,
            total_pages: self.total_pages,
        }
    }
}

/// An empty result still reports a single (empty) page.
fn total_pages(total_entries: u64, page_size: u32) -> u64 {
    if total_entries == 0 {
        return 1;
    }
    total_entries.div_ceil(page_size.max(1) as u64)
}
