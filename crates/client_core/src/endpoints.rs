//! Per-endpoint paged fetch implementations over the shared transport.
//!
//! Each remote collection gets one stateless fetcher: endpoint-specific
//! parameter encoding composed with the transport mapper. All caching
//! happens in [`crate::paging::PagedCache`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{ChannelId, MessageId, PetId, UserId},
    protocol::{MessagePayload, PagedEnvelope, PetSummary, SelectOptionItem},
};
use tracing::warn;

use crate::{
    error::{ErrorKind, FetchError},
    transport::Transport,
    types::{Page, PageItem, RemoteState},
};

/// Filter parameters understood by every paginated endpoint. Feature
/// controllers decide which fields they surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFilters {
    pub search: Option<String>,
    pub order_by: Option<String>,
    pub ascending: bool,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Default for PageFilters {
    fn default() -> Self {
        Self {
            search: None,
            order_by: None,
            ascending: true,
            from: None,
            until: None,
        }
    }
}

/// One server-paginated remote collection.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    type Item: PageItem + Clone + Send + Sync;

    async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
        filters: &PageFilters,
    ) -> RemoteState<Page<Self::Item>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PagedQuery<'a> {
    page: u32,
    per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_by: Option<&'a str>,
    ascending: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    until: Option<DateTime<Utc>>,
}

impl<'a> PagedQuery<'a> {
    fn new(page: u32, per_page: u32, filters: &'a PageFilters) -> Self {
        Self {
            page,
            per_page,
            search: filters.search.as_deref(),
            order_by: filters.order_by.as_deref(),
            ascending: filters.ascending,
            from: filters.from,
            until: filters.until,
        }
    }
}

async fn fetch_envelope<T>(
    transport: &Transport,
    path: &str,
    page: u32,
    per_page: u32,
    filters: &PageFilters,
) -> RemoteState<Page<T>>
where
    T: DeserializeOwned,
{
    let request = transport
        .get(path)
        .query(&PagedQuery::new(page, per_page, filters));
    match transport.get_json::<PagedEnvelope<T>>(request).await {
        RemoteState::Ready(envelope) => page_from_envelope(path, page, per_page, envelope),
        RemoteState::Failed(error) => RemoteState::Failed(error),
        RemoteState::Loading => RemoteState::Loading,
    }
}

/// Validates the envelope the server echoed back for one page request.
fn page_from_envelope<T>(
    path: &str,
    requested: u32,
    per_page: u32,
    envelope: PagedEnvelope<T>,
) -> RemoteState<Page<T>> {
    if envelope.current_page != requested {
        return RemoteState::Failed(FetchError::new(
            ErrorKind::Unknown,
            format!(
                "server returned page {} for a request of page {requested}",
                envelope.current_page
            ),
        ));
    }
    let mut items = envelope.items;
    if items.len() > per_page as usize {
        warn!(
            path,
            page = requested,
            returned = items.len(),
            per_page,
            "server returned an oversized page; truncating"
        );
        items.truncate(per_page as usize);
    }
    RemoteState::Ready(Page {
        number: requested,
        total_pages: envelope.total_pages.max(1),
        total_count: envelope.total_count,
        items,
    })
}

impl PageItem for PetSummary {
    type Id = PetId;

    fn id(&self) -> PetId {
        self.pet_id
    }
}

impl PageItem for MessagePayload {
    type Id = MessageId;

    fn id(&self) -> MessageId {
        self.message_id
    }
}

impl PageItem for SelectOptionItem {
    type Id = String;

    fn id(&self) -> String {
        self.value.clone()
    }
}

/// Pets owned by one user, backing the assignment pet picker.
pub struct PetPages {
    transport: Arc<Transport>,
    owner_id: UserId,
}

impl PetPages {
    pub fn new(transport: Arc<Transport>, owner_id: UserId) -> Self {
        Self {
            transport,
            owner_id,
        }
    }
}

#[async_trait]
impl PageFetcher for PetPages {
    type Item = PetSummary;

    async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
        filters: &PageFilters,
    ) -> RemoteState<Page<PetSummary>> {
        let path = format!("/users/{}/pets", self.owner_id.0);
        fetch_envelope(&self.transport, &path, page, per_page, filters).await
    }
}

/// One channel's message history.
pub struct MessagePages {
    transport: Arc<Transport>,
    channel_id: ChannelId,
}

impl MessagePages {
    pub fn new(transport: Arc<Transport>, channel_id: ChannelId) -> Self {
        Self {
            transport,
            channel_id,
        }
    }
}

#[async_trait]
impl PageFetcher for MessagePages {
    type Item = MessagePayload;

    async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
        filters: &PageFilters,
    ) -> RemoteState<Page<MessagePayload>> {
        let path = format!("/channels/{}/messages", self.channel_id.0);
        fetch_envelope(&self.transport, &path, page, per_page, filters).await
    }
}

/// A named collection of select options (service types, breeds, ...).
pub struct OptionPages {
    transport: Arc<Transport>,
    collection: String,
}

impl OptionPages {
    pub fn new(transport: Arc<Transport>, collection: impl Into<String>) -> Self {
        Self {
            transport,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl PageFetcher for OptionPages {
    type Item = SelectOptionItem;

    async fn fetch_page(
        &self,
        page: u32,
        per_page: u32,
        filters: &PageFilters,
    ) -> RemoteState<Page<SelectOptionItem>> {
        let path = format!("/options/{}", self.collection);
        fetch_envelope(&self.transport, &path, page, per_page, filters).await
    }
}
