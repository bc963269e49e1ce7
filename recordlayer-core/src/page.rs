//! Paging over query results.
//!
//! [`PaginationParams`] selects a 1-indexed page of a fixed size and [`Page`] carries the
//! selected records together with the total count and neighbouring page numbers.

use serde::{Deserialize, Serialize};

/// One page of results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of items across all pages.
    pub count: usize,
    pub next_page: Option<usize>,
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }

    /// Transforms the items while keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

pub struct PageBuilder<T> {
    page: Page<T>,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            page: Page {
                items,
                ..Page::default()
            },
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.page.count = count;
        self
    }

    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.page.next_page = next_page;
        self
    }

    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.page.previous_page = previous_page;
        self
    }

    pub fn build(self) -> Page<T> {
        self.page
    }
}

/// Which page to fetch, and how large pages are.
///
/// Pages are 1-indexed; a `page` of 0 is treated as the first page.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    pub page: usize,
    pub per_page: usize,
}

impl PaginationParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page, per_page }
    }

    pub fn builder() -> PaginationParamsBuilder {
        PaginationParamsBuilder::new()
    }

    /// Number of items preceding this page.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1) * self.per_page
    }

    /// Cuts this page out of the complete, ordered result list.
    ///
    /// A page past the end of `items` comes back empty but still reports the total count.
    pub fn paginate<T>(&self, mut items: Vec<T>) -> Page<T> {
        let count = items.len();
        let start = self.offset().min(count);
        let end = start.saturating_add(self.per_page).min(count);
        let page = self.page.max(1);

        let selected: Vec<T> = items.drain(start..end).collect();

        Page::builder(selected)
            .with_count(count)
            .with_next_page((end < count).then_some(page + 1))
            .with_previous_page((page > 1).then(|| page - 1))
            .build()
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

#[derive(Debug, Default)]
pub struct PaginationParamsBuilder {
    page: Option<usize>,
    per_page: Option<usize>,
}

impl PaginationParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    /// Missing values default to page 1 with 10 items per page.
    pub fn build(self) -> PaginationParams {
        let defaults = PaginationParams::default();

        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn middle_page_links_both_ways() {
        let page = PaginationParams::new(2, 10).paginate((1..=25).collect::<Vec<_>>());

        assert_eq!(page.items, (11..=20).collect::<Vec<_>>());
        assert_eq!(page.count, 25);
        assert_eq!(page.next_page, Some(3));
        assert_eq!(page.previous_page, Some(1));
    }

    #[test]
    fn last_page_is_partial() {
        let page = PaginationParams::new(3, 10).paginate((1..=25).collect::<Vec<_>>());

        assert_eq!(page.items, (21..=25).collect::<Vec<_>>());
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let page = PaginationParams::new(9, 10).paginate(vec![1, 2, 3]);

        assert!(page.items.is_empty());
        assert_eq!(page.count, 3);
        assert_eq!(page.next_page, None);
        assert_eq!(page.previous_page, Some(8));
    }

    #[test]
    fn builder_defaults() {
        let params = PaginationParams::builder().with_per_page(50).build();

        assert_eq!(params, PaginationParams::new(1, 50));
        assert_eq!(PaginationParams::new(3, 20).offset(), 40);
        assert_eq!(PaginationParams::new(0, 20).offset(), 0);
    }
}
