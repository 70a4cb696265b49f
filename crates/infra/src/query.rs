//! Reservation listing filters and page arithmetic.

use chrono::{DateTime, Utc};
use serde::Serialize;

use labdesk_reservations::{Reservation, ReservationStatus};

/// Listing page size.
pub const PAGE_SIZE: u32 = 10;

/// Pages shown on each side of the current page in `page_range`.
pub const PAGE_WINDOW: u32 = 2;

/// Filters for the caller's reservation list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservationQuery {
    pub status: Option<ReservationStatus>,
    /// When false only reservations ending at or after `now` are listed.
    pub show_past: bool,
}

impl ReservationQuery {
    /// Build from raw query-string values. Unknown statuses are ignored.
    pub fn from_params(status: Option<&str>, show_past: bool) -> Self {
        Self {
            status: status.and_then(|s| s.trim().parse().ok()),
            show_past,
        }
    }

    pub fn matches(&self, r: &Reservation, now: DateTime<Utc>) -> bool {
        if let Some(status) = self.status {
            if r.status != status {
                return false;
            }
        }
        self.show_past || r.slot.end() >= now
    }
}

/// Resolved position of one page within a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u32,
    pub num_pages: u32,
    pub offset: u64,
    pub limit: u32,
}

impl PageWindow {
    /// Clamp `requested` (1-based) into `1..=num_pages`; an empty set has one page.
    pub fn resolve(requested: u32, total: u64) -> Self {
        let num_pages = total.div_ceil(u64::from(PAGE_SIZE)).max(1);
        let num_pages = u32::try_from(num_pages).unwrap_or(u32::MAX);
        let page = requested.clamp(1, num_pages);
        Self {
            page,
            num_pages,
            offset: u64::from(page - 1) * u64::from(PAGE_SIZE),
            limit: PAGE_SIZE,
        }
    }

    pub fn page_range(&self) -> Vec<u32> {
        let first = self.page.saturating_sub(PAGE_WINDOW).max(1);
        let last = self.page.saturating_add(PAGE_WINDOW).min(self.num_pages);
        (first..=last).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub num_pages: u32,
    pub page_size: u32,
    pub total: u64,
    pub is_paginated: bool,
    pub page_range: Vec<u32>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            num_pages: self.num_pages,
            page_size: self.page_size,
            total: self.total,
            is_paginated: self.is_paginated,
            page_range: self.page_range,
        }
    }

    pub fn new(items: Vec<T>, window: PageWindow, total: u64) -> Self {
        Self {
            items,
            page: window.page,
            num_pages: window.num_pages,
            page_size: PAGE_SIZE,
            total,
            is_paginated: total > u64::from(PAGE_SIZE),
            page_range: window.page_range(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_one_page() {
        let w = PageWindow::resolve(3, 0);
        assert_eq!((w.page, w.num_pages, w.offset), (1, 1, 0));
        assert_eq!(w.page_range(), [1]);
    }

    #[test]
    fn out_of_range_pages_clamp_to_last() {
        let w = PageWindow::resolve(99, 35);
        assert_eq!(w.num_pages, 4);
        assert_eq!(w.page, 4);
        assert_eq!(w.offset, 30);
        assert_eq!(PageWindow::resolve(0, 35).page, 1);
    }

    #[test]
    fn page_range_is_two_either_side() {
        assert_eq!(PageWindow::resolve(5, 100).page_range(), [3, 4, 5, 6, 7]);
        assert_eq!(PageWindow::resolve(1, 100).page_range(), [1, 2, 3]);
        assert_eq!(PageWindow::resolve(10, 100).page_range(), [8, 9, 10]);
    }

    #[test]
    fn is_paginated_only_above_page_size() {
        let page: Page<u8> = Page::new(vec![], PageWindow::resolve(1, 10), 10);
        assert!(!page.is_paginated);
        let page: Page<u8> = Page::new(vec![], PageWindow::resolve(1, 11), 11);
        assert!(page.is_paginated);
    }

    #[test]
    fn unknown_status_filter_is_ignored() {
        let q = ReservationQuery::from_params(Some("archived"), false);
        assert_eq!(q.status, None);
        let q = ReservationQuery::from_params(Some("pending"), true);
        assert_eq!(q.status, Some(ReservationStatus::Pending));
        assert!(q.show_past);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn resolved_window_stays_inside_the_result_set(requested in 0u32..500, total in 0u64..5_000) {
                let w = PageWindow::resolve(requested, total);
                prop_assert!(w.page >= 1 && w.page <= w.num_pages);
                prop_assert!(w.offset < total.max(1));
                let range = w.page_range();
                prop_assert!(range.contains(&w.page));
                prop_assert!(range.len() <= (2 * PAGE_WINDOW + 1) as usize);
                prop_assert!(range.iter().all(|p| (1..=w.num_pages).contains(p)));
            }
        }
    }
}
