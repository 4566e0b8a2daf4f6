use shoplist_core::domain::ChannelId;

use crate::store::ListStore;

pub const DEMO_TITLE: &str = "Weekly Groceries";

/// Items of the demo list, in display order.
pub const DEMO_ITEMS: &[&str] =
    &["Milk (2 liters)", "Bread", "Eggs (dozen)", "Apples", "Chicken breast"];

pub const DEMO_ADDED_ITEM: &str = "Orange juice";

/// Items checked off after seeding, matched by text prefix.
const DEMO_CHECKED_PREFIXES: &[&str] = &["Milk", "Bread"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoSeedResult {
    pub channel: ChannelId,
    pub title: String,
    pub items: usize,
    pub checked: usize,
}

/// Replaces the channel's list with the demo groceries list: five items, one
/// appended afterwards, two checked off so the clear-completed action shows.
pub async fn seed_demo_list(store: &ListStore, channel: &ChannelId) -> DemoSeedResult {
    let list = store.create_list(channel, DEMO_TITLE, DEMO_ITEMS.iter().copied()).await;
    store.add_item(channel, DEMO_ADDED_ITEM, 1).await;

    let mut checked = 0;
    for item in &list.items {
        if DEMO_CHECKED_PREFIXES.iter().any(|prefix| item.text.starts_with(prefix))
            && store.toggle_item_checked(channel, &item.id).await.is_some()
        {
            checked += 1;
        }
    }

    let items = store.get_list(channel).await.map_or(0, |list| list.items.len());
    tracing::info!(
        event_name = "store.seed.completed",
        channel_id = %channel,
        items,
        checked,
        "seeded demo shopping list"
    );

    DemoSeedResult { channel: channel.clone(), title: DEMO_TITLE.to_owned(), items, checked }
}
