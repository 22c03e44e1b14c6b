use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{domain::ChannelId, protocol::MessagePayload};
use tokio::sync::{watch, Mutex};

use crate::{
    endpoints::{MessagePages, PageFilters},
    paging::PagedCache,
    transport::Transport,
};

use super::{common::ControllerCore, Snapshot};

const MESSAGE_FEED_PER_PAGE: u32 = 30;

/// One channel's paged message history.
pub struct MessageFeedController {
    transport: Arc<Transport>,
    channel: Mutex<ChannelId>,
    core: ControllerCore<MessagePayload>,
}

impl MessageFeedController {
    pub fn new(transport: Arc<Transport>, channel_id: ChannelId) -> Self {
        let core = ControllerCore::new(message_cache(&transport, channel_id));
        Self {
            transport,
            channel: Mutex::new(channel_id),
            core,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<MessagePayload>> {
        self.core.subscribe()
    }

    pub async fn request(&self, page: i64) {
        self.core.request(page).await;
    }

    pub async fn reload(&self) {
        self.core.reload().await;
    }

    pub async fn set_date_range(
        &self,
        from: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) {
        self.core
            .update_filters(|filters| {
                filters.from = from;
                filters.until = until;
            })
            .await;
    }

    /// Switches the feed to another channel, emptying the cached history.
    pub async fn set_channel(&self, channel_id: ChannelId) {
        {
            let mut channel = self.channel.lock().await;
            if *channel == channel_id {
                return;
            }
            *channel = channel_id;
        }
        self.core
            .replace_cache(message_cache(&self.transport, channel_id))
            .await;
    }
}

fn message_cache(
    transport: &Arc<Transport>,
    channel_id: ChannelId,
) -> Arc<PagedCache<MessagePayload>> {
    Arc::new(PagedCache::new(
        Arc::new(MessagePages::new(Arc::clone(transport), channel_id)),
        MESSAGE_FEED_PER_PAGE,
        PageFilters::default(),
    ))
}
