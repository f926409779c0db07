//! Offset/limit pagination
//!
//! Drives the fetcher across a paginated endpoint, assembling the complete
//! result set by following the response's own reported total. `collect`
//! treats a failed page as truncation and keeps what was already gathered;
//! `try_collect` treats it as failure of the whole walk. Seeding uses the
//! former (later sync cycles revisit what the truncation missed), the
//! album backfill uses the latter (a truncated discography must not be
//! marked as fully walked).

use crate::catalog::Page;
use crate::client::Fetcher;
use crate::{FetchError, FetchResult};
use serde::de::DeserializeOwned;

/// Collects every item of a paginated collection endpoint
pub struct PaginatedCollector<'a> {
    fetcher: &'a Fetcher,
    page_size: u32,
}

impl<'a> PaginatedCollector<'a> {
    pub fn new(fetcher: &'a Fetcher, page_size: u32) -> Self {
        Self { fetcher, page_size }
    }

    /// Fetches pages with increasing offset, truncating on failure
    pub async fn collect<T: DeserializeOwned>(&self, endpoint: &str) -> Vec<T> {
        let (items, error) = self.walk(endpoint).await;
        if let Some(e) = error {
            tracing::warn!(
                "Pagination truncated after {} items for {}: {}",
                items.len(),
                endpoint,
                e
            );
        }
        items
    }

    /// Fetches pages with increasing offset, failing the walk on any error
    pub async fn try_collect<T: DeserializeOwned>(&self, endpoint: &str) -> FetchResult<Vec<T>> {
        let (items, error) = self.walk(endpoint).await;
        match error {
            Some(e) => Err(e),
            None => Ok(items),
        }
    }

    /// Pages until `offset >= total`, returning items plus the error that
    /// ended the walk early, if any
    ///
    /// The endpoint may already carry query parameters; `limit` and
    /// `offset` are appended with the appropriate separator.
    async fn walk<T: DeserializeOwned>(&self, endpoint: &str) -> (Vec<T>, Option<FetchError>) {
        let mut items = Vec::new();
        let mut offset: u64 = 0;

        loop {
            let url = self.page_url(endpoint, offset);
            let raw = match self.fetcher.get_json(&url).await {
                Ok(raw) => raw,
                Err(e) => return (items, Some(e)),
            };

            let page: Page<T> = match serde_json::from_value(raw) {
                Ok(page) => page,
                Err(e) => {
                    return (
                        items,
                        Some(FetchError::MalformedResponse(format!(
                            "page at offset {}: {}",
                            offset, e
                        ))),
                    )
                }
            };

            if page.items.is_empty() {
                break;
            }

            offset += page.items.len() as u64;
            items.extend(page.items);

            // Endpoints that omit `total` are paged on `next` alone
            let has_more = if page.total > 0 {
                offset < page.total
            } else {
                page.next.is_some()
            };
            if !has_more {
                break;
            }
        }

        (items, None)
    }

    fn page_url(&self, endpoint: &str, offset: u64) -> String {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}limit={}&offset={}",
            endpoint, separator, self.page_size, offset
        )
    }
}
