//! Pagination handling for the Bullhorn REST API.
//!
//! List and search endpoints page with `start`/`count`. Enumeration stops on
//! the first empty page; the reported `total` is informational only.

use std::future::Future;

use crate::error::BullhornResult;
use crate::types::ListPage;

/// Page size for top-level search.
pub const SEARCH_PAGE_SIZE: u32 = 200;
/// Page size for `customObject1s` sub-collections.
pub const CUSTOM_OBJECT_PAGE_SIZE: u32 = 10;
/// Page size for file attachments.
pub const FILE_ATTACHMENT_PAGE_SIZE: u32 = 100;

/// Position within an enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageCursor {
    /// Offset of the next page.
    pub start: u32,
    /// Requested page size.
    pub count: u32,
}

impl PageCursor {
    pub fn new(count: u32) -> Self {
        Self { start: 0, count }
    }

    /// Move past `returned` records.
    pub fn advance(&mut self, returned: usize) {
        self.start = self.start.saturating_add(returned as u32);
    }
}

/// Records collected from every page.
#[derive(Clone, Debug)]
pub struct Paginated<T> {
    /// Total reported by the first page, if any.
    pub total: Option<u64>,
    /// Records in server order.
    pub records: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Page-by-page enumeration.
pub struct Paginator<F> {
    fetch: F,
    cursor: PageCursor,
    total: Option<u64>,
    pages: u32,
    done: bool,
}

impl<T, F, Fut> Paginator<F>
where
    F: FnMut(PageCursor) -> Fut,
    Fut: Future<Output = BullhornResult<ListPage<T>>>,
{
    /// Create a paginator. `fetch` is called with the cursor of each page.
    pub fn new(page_size: u32, fetch: F) -> Self {
        Self {
            fetch,
            cursor: PageCursor::new(page_size),
            total: None,
            pages: 0,
            done: false,
        }
    }

    /// Next non-empty page, or `None` once an empty page was seen.
    pub async fn next_page(&mut self) -> BullhornResult<Option<Vec<T>>> {
        if self.done {
            return Ok(None);
        }

        let page = (self.fetch)(self.cursor).await?;
        if self.pages == 0 {
            self.total = page.total;
        }
        self.pages += 1;

        if page.data.is_empty() {
            self.done = true;
            return Ok(None);
        }

        tracing::debug!(
            start = self.cursor.start,
            returned = page.data.len(),
            "Fetched page"
        );
        self.cursor.advance(page.data.len());
        Ok(Some(page.data))
    }

    /// Collect every remaining record.
    pub async fn collect_all(mut self) -> BullhornResult<Paginated<T>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }

        if let Some(total) = self.total {
            if total != records.len() as u64 {
                tracing::warn!(
                    reported = total,
                    collected = records.len(),
                    "Reported total differs from records collected"
                );
            }
        }

        Ok(Paginated {
            total: self.total,
            records,
        })
    }

    /// Pages fetched so far, the terminating empty page included.
    pub fn pages_fetched(&self) -> u32 {
        self.pages
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }
}

/// Fetch every record with `fetch`, starting at offset 0.
pub async fn fetch_all<T, F, Fut>(page_size: u32, fetch: F) -> BullhornResult<Paginated<T>>
where
    F: FnMut(PageCursor) -> Fut,
    Fut: Future<Output = BullhornResult<ListPage<T>>>,
{
    Paginator::new(page_size, fetch).collect_all().await
}
