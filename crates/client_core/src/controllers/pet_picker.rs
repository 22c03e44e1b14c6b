use std::sync::Arc;

use shared::{
    domain::{PetId, UserId},
    protocol::PetSummary,
};
use tokio::sync::{watch, Mutex};

use crate::{
    endpoints::{PageFilters, PetPages},
    paging::PagedCache,
    transport::Transport,
};

use super::{common::ControllerCore, Snapshot};

const PET_PICKER_PER_PAGE: u32 = 15;

/// Picks pets to attach to a draft walk assignment: a windowed cache over
/// one owner's pets plus a multi-select overlay that feeds assignment
/// publication.
pub struct PetPickerController {
    transport: Arc<Transport>,
    owner: Mutex<UserId>,
    core: ControllerCore<PetSummary>,
}

impl PetPickerController {
    pub fn new(transport: Arc<Transport>, owner_id: UserId) -> Self {
        let core = ControllerCore::new(pet_cache(&transport, owner_id));
        Self {
            transport,
            owner: Mutex::new(owner_id),
            core,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<PetSummary>> {
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

    pub async fn set_ordering(&self, order_by: Option<String>, ascending: bool) {
        self.core
            .update_filters(|filters| {
                filters.order_by = order_by;
                filters.ascending = ascending;
            })
            .await;
    }

    /// Retargets the picker at another owner's pets. The draft selection
    /// belongs to the previous owner and is dropped.
    pub async fn set_owner(&self, owner_id: UserId) {
        {
            let mut owner = self.owner.lock().await;
            if *owner == owner_id {
                return;
            }
            *owner = owner_id;
        }
        self.core
            .replace_cache(pet_cache(&self.transport, owner_id))
            .await;
    }

    pub async fn select(&self, pet: PetSummary) {
        self.core.select(pet).await;
    }

    pub async fn deselect(&self, pet_id: PetId) {
        self.core.deselect(&pet_id).await;
    }

    /// Returns whether the pet is selected after the toggle.
    pub async fn toggle(&self, pet: PetSummary) -> bool {
        self.core.toggle(pet).await
    }

    /// Ids handed to assignment publication.
    pub async fn selected_pet_ids(&self) -> Vec<PetId> {
        self.core.selected_ids().await
    }
}

fn pet_cache(transport: &Arc<Transport>, owner_id: UserId) -> Arc<PagedCache<PetSummary>> {
    Arc::new(PagedCache::new(
        Arc::new(PetPages::new(Arc::clone(transport), owner_id)),
        PET_PICKER_PER_PAGE,
        PageFilters::default(),
    ))
}
