//! Feature controllers: thin per-screen adapters that own one windowed
//! cache, supply its filters, and overlay locally-held selections.

mod common;
mod message_feed;
mod option_selector;
mod pet_picker;

pub use message_feed::MessageFeedController;
pub use option_selector::OptionSelectorController;
pub use pet_picker::PetPickerController;

use crate::{
    endpoints::PageFilters,
    types::{CacheWindow, PageItem, RemoteState},
};

/// Reactive snapshot exposed by every feature controller.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub state: RemoteState<Vec<T>>,
    pub filters: PageFilters,
    pub selected: Vec<T>,
    pub window: Option<CacheWindow>,
    pub total_count: Option<u64>,
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self {
            state: RemoteState::Loading,
            filters: PageFilters::default(),
            selected: Vec::new(),
            window: None,
            total_count: None,
        }
    }
}

/// Locally-held selection overlay. The full item is retained so a
/// selection stays visible even when the page that produced it leaves the
/// window.
#[derive(Debug, Clone)]
pub struct Selection<T: PageItem> {
    items: Vec<T>,
}

impl<T: PageItem + Clone> Selection<T> {
    fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.items.iter().any(|item| item.id() == *id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn insert(&mut self, item: T) -> bool {
        if self.contains(&item.id()) {
            return false;
        }
        self.items.push(item);
        true
    }

    fn remove(&mut self, id: &T::Id) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != *id);
        self.items.len() != before
    }

    /// Returns whether the item is selected after the toggle.
    fn toggle(&mut self, item: T) -> bool {
        let id = item.id();
        if self.remove(&id) {
            false
        } else {
            self.items.push(item);
            true
        }
    }

    fn items(&self) -> Vec<T> {
        self.items.clone()
    }

    fn ids(&self) -> Vec<T::Id> {
        self.items.iter().map(PageItem::id).collect()
    }

    fn clear(&mut self) {
        self.items.clear();
    }
}
