//! Cache ownership, snapshot publication, and selection bookkeeping shared
//! by every feature controller.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};

use crate::{
    endpoints::PageFilters,
    paging::{CacheSnapshot, PagedCache},
    types::PageItem,
};

use super::{Selection, Snapshot};

pub(super) struct ControllerCore<T: PageItem + Clone + Send + Sync> {
    tx: watch::Sender<Snapshot<T>>,
    inner: Mutex<CoreInner<T>>,
}

struct CoreInner<T: PageItem + Clone + Send + Sync> {
    cache: Arc<PagedCache<T>>,
    selection: Selection<T>,
    last_page: u32,
}

impl<T: PageItem + Clone + Send + Sync + 'static> ControllerCore<T> {
    pub(super) fn new(cache: Arc<PagedCache<T>>) -> Self {
        let (tx, _) = watch::channel(Snapshot::empty());
        Self {
            tx,
            inner: Mutex::new(CoreInner {
                cache,
                selection: Selection::new(),
                last_page: 1,
            }),
        }
    }

    pub(super) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.tx.subscribe()
    }

    pub(super) async fn request(&self, page: i64) {
        let cache = {
            let mut inner = self.inner.lock().await;
            inner.last_page = page.clamp(1, i64::from(u32::MAX)) as u32;
            Arc::clone(&inner.cache)
        };
        let snapshot = cache.request(page).await;
        self.publish(&cache, snapshot).await;
    }

    /// Re-issues the last requested page; the explicit retry after a
    /// failure.
    pub(super) async fn reload(&self) {
        let page = i64::from(self.inner.lock().await.last_page);
        self.request(page).await;
    }

    pub(super) async fn update_filters(&self, apply: impl FnOnce(&mut PageFilters)) {
        let cache = Arc::clone(&self.inner.lock().await.cache);
        let mut filters = cache.filters().await;
        apply(&mut filters);
        if !cache.set_filters(filters).await {
            return;
        }
        self.inner.lock().await.last_page = 1;
        self.publish(&cache, cache.snapshot().await).await;
        let snapshot = cache.request(1).await;
        self.publish(&cache, snapshot).await;
    }

    /// Swaps in a cache for a new identity. Selections belong to the old
    /// identity and are dropped with it.
    pub(super) async fn replace_cache(&self, cache: Arc<PagedCache<T>>) {
        {
            let mut inner = self.inner.lock().await;
            inner.cache = Arc::clone(&cache);
            inner.selection.clear();
            inner.last_page = 1;
        }
        self.publish(&cache, cache.snapshot().await).await;
        let snapshot = cache.request(1).await;
        self.publish(&cache, snapshot).await;
    }

    pub(super) async fn select(&self, item: T) {
        let changed = self.inner.lock().await.selection.insert(item);
        if changed {
            self.republish().await;
        }
    }

    pub(super) async fn deselect(&self, id: &T::Id) {
        let changed = self.inner.lock().await.selection.remove(id);
        if changed {
            self.republish().await;
        }
    }

    /// Returns whether the item is selected after the toggle.
    pub(super) async fn toggle(&self, item: T) -> bool {
        let selected = self.inner.lock().await.selection.toggle(item);
        self.republish().await;
        selected
    }

    pub(super) async fn selected_ids(&self) -> Vec<T::Id> {
        self.inner.lock().await.selection.ids()
    }

    async fn republish(&self) {
        let cache = Arc::clone(&self.inner.lock().await.cache);
        let snapshot = cache.snapshot().await;
        self.publish(&cache, snapshot).await;
    }

    async fn publish(&self, cache: &Arc<PagedCache<T>>, snapshot: CacheSnapshot<T>) {
        let filters = cache.filters().await;
        let inner = self.inner.lock().await;
        if !Arc::ptr_eq(&inner.cache, cache) {
            // Completion for a cache this controller already replaced.
            return;
        }
        self.tx.send_replace(Snapshot {
            state: snapshot.state,
            filters,
            selected: inner.selection.items(),
            window: snapshot.window,
            total_count: snapshot.total_count,
        });
    }
}
