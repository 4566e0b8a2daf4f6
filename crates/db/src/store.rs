use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use shoplist_core::domain::list::{Item, ItemId, ShoppingList};
use shoplist_core::domain::settings::ChannelSetting;
use shoplist_core::domain::{ChannelId, GuildId, MessageId};

use crate::snapshot::{InMemorySnapshotStore, SnapshotStore, StoreSnapshot};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub lists: usize,
    pub items: usize,
    pub configured_guilds: usize,
}

/// Owns every list and channel setting. All access goes through one lock, so
/// racing mutations are applied one after another and the last write wins.
pub struct ListStore {
    state: Mutex<StoreSnapshot>,
    persistence: Arc<dyn SnapshotStore>,
}

impl ListStore {
    /// Loads persisted state. A missing or unreadable snapshot yields an empty
    /// store; the failure is logged.
    pub async fn open(persistence: Arc<dyn SnapshotStore>) -> Self {
        let snapshot = match persistence.load().await {
            Ok(snapshot) => {
                info!(
                    event_name = "store.load.completed",
                    lists = snapshot.lists.len(),
                    guilds = snapshot.settings.len(),
                    "loaded persisted shopping lists"
                );
                snapshot
            }
            Err(error) => {
                warn!(
                    event_name = "store.load.failed",
                    error = %error,
                    "could not load persisted state; starting empty"
                );
                StoreSnapshot::default()
            }
        };

        Self { state: Mutex::new(snapshot), persistence }
    }

    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(StoreSnapshot::default()),
            persistence: Arc::new(InMemorySnapshotStore::default()),
        }
    }

    pub async fn create_list<I, S>(&self, channel: &ChannelId, title: &str, item_texts: I) -> ShoppingList
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.insert_list(channel, ShoppingList::new(title, item_texts)).await
    }

    /// Stores an already built list, replacing whatever the channel held.
    pub async fn insert_list(&self, channel: &ChannelId, list: ShoppingList) -> ShoppingList {
        let mut state = self.state.lock().await;
        state.lists.insert(channel.clone(), list.clone());
        self.persist(&state).await;
        list
    }

    pub async fn get_list(&self, channel: &ChannelId) -> Option<ShoppingList> {
        self.state.lock().await.lists.get(channel).cloned()
    }

    pub async fn add_item(&self, channel: &ChannelId, text: &str, quantity: u32) -> Option<Item> {
        let mut state = self.state.lock().await;
        let list = state.lists.get_mut(channel)?;
        let item = Item::with_quantity(text.trim(), quantity);
        list.items.push(item.clone());
        self.persist(&state).await;
        Some(item)
    }

    pub async fn toggle_item_checked(&self, channel: &ChannelId, item_id: &ItemId) -> Option<Item> {
        let mut state = self.state.lock().await;
        let item = state.lists.get_mut(channel)?.item_mut(item_id)?;
        item.checked = !item.checked;
        let item = item.clone();
        self.persist(&state).await;
        Some(item)
    }

    pub async fn edit_item(
        &self,
        channel: &ChannelId,
        item_id: &ItemId,
        new_text: &str,
    ) -> Option<Item> {
        let mut state = self.state.lock().await;
        let item = state.lists.get_mut(channel)?.item_mut(item_id)?;
        item.text = new_text.to_owned();
        let item = item.clone();
        self.persist(&state).await;
        Some(item)
    }

    pub async fn clear_completed_items(&self, channel: &ChannelId) -> usize {
        let mut state = self.state.lock().await;
        let Some(list) = state.lists.get_mut(channel) else {
            return 0;
        };
        let removed = list.remove_checked();
        self.persist(&state).await;
        removed
    }

    /// Empties the list but keeps its title and render target.
    pub async fn clear_list(&self, channel: &ChannelId) -> bool {
        let mut state = self.state.lock().await;
        let Some(list) = state.lists.get_mut(channel) else {
            return false;
        };
        list.items.clear();
        self.persist(&state).await;
        true
    }

    pub async fn set_render_target(&self, channel: &ChannelId, message: &MessageId) -> bool {
        let mut state = self.state.lock().await;
        let Some(list) = state.lists.get_mut(channel) else {
            return false;
        };
        list.render_target = Some(message.clone());
        self.persist(&state).await;
        true
    }

    pub async fn set_shopping_channel(&self, guild: &GuildId, channel: &ChannelId) {
        let mut state = self.state.lock().await;
        state
            .settings
            .insert(guild.clone(), ChannelSetting { shopping_channel: Some(channel.clone()) });
        self.persist(&state).await;
    }

    pub async fn get_shopping_channel(&self, guild: &GuildId) -> Option<ChannelId> {
        self.state.lock().await.settings.get(guild).and_then(|setting| setting.shopping_channel.clone())
    }

    pub async fn delete_list(&self, channel: &ChannelId) -> bool {
        let mut state = self.state.lock().await;
        if state.lists.remove(channel).is_none() {
            return false;
        }
        self.persist(&state).await;
        true
    }

    pub async fn remove_item(&self, channel: &ChannelId, item_id: &ItemId) -> bool {
        let mut state = self.state.lock().await;
        let Some(list) = state.lists.get_mut(channel) else {
            return false;
        };
        let before = list.items.len();
        list.items.retain(|item| &item.id != item_id);
        if list.items.len() == before {
            return false;
        }
        self.persist(&state).await;
        true
    }

    /// Item at a 0-based position.
    pub async fn item_at(&self, channel: &ChannelId, index: usize) -> Option<Item> {
        self.state.lock().await.lists.get(channel)?.item_at(index).cloned()
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.lock().await;
        StoreStats {
            lists: state.lists.len(),
            items: state.lists.values().map(|list| list.items.len()).sum(),
            configured_guilds: state
                .settings
                .values()
                .filter(|setting| setting.shopping_channel.is_some())
                .count(),
        }
    }

    async fn persist(&self, state: &StoreSnapshot) {
        if let Err(error) = self.persistence.save(state).await {
            warn!(
                event_name = "store.persist.failed",
                error = %error,
                "failed to persist shopping lists; in-memory state kept"
            );
        }
    }
}
