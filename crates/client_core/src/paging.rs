//! Windowed page cache: incremental fetching and merging of
//! server-paginated collections.
//!
//! The cache materializes one contiguous range of pages (the window). It
//! grows the window while the caller advances forward one page at a time
//! and collapses it to a two-page span on any jump, including requests
//! below the window. Only completed requests mutate observable state, and
//! a request superseded by a newer one is dropped on completion.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    endpoints::{PageFetcher, PageFilters},
    error::{ErrorKind, FetchError},
    types::{CacheWindow, Page, PageItem, RemoteState},
};

/// Aggregate view of one cache at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSnapshot<T> {
    pub state: RemoteState<Vec<T>>,
    pub window: Option<CacheWindow>,
    pub total_pages: Option<u32>,
    pub total_count: Option<u64>,
}

pub struct PagedCache<T: PageItem + Clone + Send + Sync> {
    fetcher: Arc<dyn PageFetcher<Item = T>>,
    per_page: u32,
    inner: Mutex<CacheInner<T>>,
}

struct CacheInner<T> {
    filters: PageFilters,
    window: Option<CacheWindow>,
    pages: BTreeMap<u32, Vec<T>>,
    merged: Vec<T>,
    status: RemoteState<()>,
    total_pages: Option<u32>,
    total_count: Option<u64>,
    issued: u64,
}

impl<T: PageItem + Clone + Send + Sync> PagedCache<T> {
    pub fn new(
        fetcher: Arc<dyn PageFetcher<Item = T>>,
        per_page: u32,
        filters: PageFilters,
    ) -> Self {
        Self {
            fetcher,
            per_page: per_page.max(1),
            inner: Mutex::new(CacheInner {
                filters,
                window: None,
                pages: BTreeMap::new(),
                merged: Vec::new(),
                status: RemoteState::Loading,
                total_pages: None,
                total_count: None,
                issued: 0,
            }),
        }
    }

    pub async fn snapshot(&self) -> CacheSnapshot<T> {
        snapshot_of(&*self.inner.lock().await)
    }

    pub async fn filters(&self) -> PageFilters {
        self.inner.lock().await.filters.clone()
    }

    /// Replaces the active filter set, emptying the window and
    /// invalidating any in-flight request. Returns false (and does
    /// nothing) when the filters are unchanged.
    pub async fn set_filters(&self, filters: PageFilters) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.filters == filters {
            return false;
        }
        inner.filters = filters;
        inner.window = None;
        inner.pages.clear();
        inner.merged.clear();
        inner.status = RemoteState::Loading;
        inner.total_pages = None;
        inner.total_count = None;
        inner.issued += 1;
        true
    }

    /// Ensures `page` is materialized, fetching whatever the target window
    /// is missing. Returns the snapshot after this request settled, or the
    /// current snapshot when the request needed no work or was superseded.
    pub async fn request(&self, page: i64) -> CacheSnapshot<T> {
        let page = page.clamp(1, i64::from(u32::MAX)) as u32;

        let (token, target, missing, filters) = {
            let mut inner = self.inner.lock().await;
            let target = target_window(inner.window, page);
            let missing: Vec<u32> = target
                .pages()
                .filter(|candidate| !inner.pages.contains_key(candidate))
                .collect();
            if missing.is_empty() {
                // Fully covered: nothing to fetch, nothing to discard.
                inner.window = Some(target);
                return snapshot_of(&inner);
            }
            inner.issued += 1;
            (inner.issued, target, missing, inner.filters.clone())
        };

        let fetches = missing.into_iter().map(|number| {
            let fetcher = Arc::clone(&self.fetcher);
            let filters = filters.clone();
            let per_page = self.per_page;
            async move {
                (
                    number,
                    fetcher.fetch_page(number, per_page, &filters).await,
                )
            }
        });
        let results = join_all(fetches).await;

        let mut inner = self.inner.lock().await;
        if inner.issued != token {
            debug!(page, "dropping completion of a superseded page request");
            return snapshot_of(&inner);
        }

        // `join_all` preserves input order and the missing pages were
        // collected ascending, so the first failure scanned here is the
        // first failure in page order.
        let mut fetched: Vec<(u32, Page<T>)> = Vec::with_capacity(results.len());
        let mut failure: Option<FetchError> = None;
        for (number, result) in results {
            match result {
                RemoteState::Ready(fetched_page) => fetched.push((number, fetched_page)),
                RemoteState::Failed(error) => {
                    if failure.is_none() {
                        failure = Some(error);
                    }
                }
                RemoteState::Loading => {
                    if failure.is_none() {
                        failure = Some(FetchError::new(
                            ErrorKind::Unknown,
                            format!("page {number} fetch completed without a result"),
                        ));
                    }
                }
            }
        }

        if let Some(error) = failure {
            debug!(page, error = %error, "page request failed");
            inner.status = RemoteState::Failed(error);
            return snapshot_of(&inner);
        }

        inner.pages.retain(|number, _| target.contains(*number));
        for (number, fetched_page) in fetched {
            inner.total_pages = Some(fetched_page.total_pages);
            inner.total_count = Some(fetched_page.total_count);
            inner.pages.insert(number, fetched_page.items);
        }
        inner.window = Some(target);
        inner.merged = merge_pages(&inner.pages);
        inner.status = RemoteState::Ready(());
        snapshot_of(&inner)
    }
}

/// Forward-advance policy: a page overlapping or immediately following the
/// window extends it, keeping `low`; anything else (empty cache, forward
/// jump, or a request below `low`) collapses to the two-page span ending
/// at `page`.
fn target_window(window: Option<CacheWindow>, page: u32) -> CacheWindow {
    match window {
        Some(window) if page >= window.low && page <= window.high + 1 => CacheWindow {
            low: window.low,
            high: window.high.max(page),
        },
        _ => CacheWindow {
            low: page.saturating_sub(1).max(1),
            high: page,
        },
    }
}

/// Page-ordered union of the retained pages, deduplicated by item id
/// (first occurrence wins).
fn merge_pages<T: PageItem + Clone>(pages: &BTreeMap<u32, Vec<T>>) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for items in pages.values() {
        for item in items {
            if seen.insert(item.id()) {
                merged.push(item.clone());
            }
        }
    }
    merged
}

fn snapshot_of<T: Clone>(inner: &CacheInner<T>) -> CacheSnapshot<T> {
    let state = match &inner.status {
        RemoteState::Loading => RemoteState::Loading,
        RemoteState::Failed(error) => RemoteState::Failed(error.clone()),
        RemoteState::Ready(()) => RemoteState::Ready(inner.merged.clone()),
    };
    CacheSnapshot {
        state,
        window: inner.window,
        total_pages: inner.total_pages,
        total_count: inner.total_count,
    }
}

#[cfg(test)]
#[path = "tests/paging_tests.rs"]
mod tests;
