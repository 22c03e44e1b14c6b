use std::sync::Arc;

use shared::protocol::SelectOptionItem;
use tokio::sync::{watch, Mutex};

use crate::{
    endpoints::{OptionPages, PageFilters},
    paging::PagedCache,
    transport::Transport,
};

use super::{common::ControllerCore, Snapshot};

const OPTION_SELECTOR_PER_PAGE: u32 = 20;

/// Paged multi-select input over a named option collection.
pub struct OptionSelectorController {
    transport: Arc<Transport>,
    collection: Mutex<String>,
    core: ControllerCore<SelectOptionItem>,
}

impl OptionSelectorController {
    pub fn new(transport: Arc<Transport>, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let core = ControllerCore::new(option_cache(&transport, &collection));
        Self {
            transport,
            collection: Mutex::new(collection),
            core,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<SelectOptionItem>> {
        self.core.subscribe()
    }

    pub async fn request(&self, page: i64) {
        self.core.request(page).await;
    }

    pub async fn reload(&self) {
        self.core.reload().await;
    }

    pub async fn set_search(&self, search: Option<String>) {
        self.core
            .update_filters(|filters| filters.search = search)
            .await;
    }

    /// Points the selector at another option collection, dropping the
    /// previous selection with it.
    pub async fn set_collection(&self, collection: impl Into<String>) {
        let collection = collection.into();
        {
            let mut current = self.collection.lock().await;
            if *current == collection {
                return;
            }
            *current = collection.clone();
        }
        self.core
            .replace_cache(option_cache(&self.transport, &collection))
            .await;
    }

    pub async fn select(&self, option: SelectOptionItem) {
        self.core.select(option).await;
    }

    pub async fn deselect(&self, value: &str) {
        self.core.deselect(&value.to_string()).await;
    }

    /// Returns whether the option is selected after the toggle.
    pub async fn toggle(&self, option: SelectOptionItem) -> bool {
        self.core.toggle(option).await
    }

    pub async fn selected_values(&self) -> Vec<String> {
        self.core.selected_ids().await
    }
}

fn option_cache(
    transport: &Arc<Transport>,
    collection: &str,
) -> Arc<PagedCache<SelectOptionItem>> {
    Arc::new(PagedCache::new(
        Arc::new(OptionPages::new(Arc::clone(transport), collection)),
        OPTION_SELECTOR_PER_PAGE,
        PageFilters::default(),
    ))
}
