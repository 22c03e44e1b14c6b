//! Client-side data-synchronization core for the pet-walking marketplace:
//! one transport-result mapper, per-endpoint paged fetchers, a windowed
//! page cache, and the feature controllers built on top of them.

use std::sync::Arc;

use shared::domain::{ChannelId, UserId};

pub mod controllers;
pub mod endpoints;
pub mod error;
pub mod paging;
pub mod transport;
pub mod types;

pub use controllers::{
    MessageFeedController, OptionSelectorController, PetPickerController, Snapshot,
};
pub use endpoints::{PageFetcher, PageFilters};
pub use error::{ErrorKind, FetchError};
pub use paging::{CacheSnapshot, PagedCache};
pub use transport::{AuthTokenStream, Transport, TransportInitError};
pub use types::{CacheWindow, Page, PageItem, RemoteState};

/// Shared entry point: one configured transport handed to every feature
/// controller.
pub struct SyncClient {
    transport: Arc<Transport>,
}

impl SyncClient {
    pub fn connect(server_url: &str, auth: AuthTokenStream) -> Result<Self, TransportInitError> {
        Ok(Self {
            transport: Arc::new(Transport::connect(server_url, auth)?),
        })
    }

    pub fn transport(&self) -> Arc<Transport> {
        Arc::clone(&self.transport)
    }

    pub fn pet_picker(&self, owner_id: UserId) -> PetPickerController {
        PetPickerController::new(Arc::clone(&self.transport), owner_id)
    }

    pub fn message_feed(&self, channel_id: ChannelId) -> MessageFeedController {
        MessageFeedController::new(Arc::clone(&self.transport), channel_id)
    }

    pub fn option_selector(&self, collection: impl Into<String>) -> OptionSelectorController {
        OptionSelectorController::new(Arc::clone(&self.transport), collection)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
