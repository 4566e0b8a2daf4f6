use std::sync::Arc;

use crate::commands::{block_on, CommandResult};
use shoplist_core::config::{AppConfig, LoadOptions};
use shoplist_core::domain::ChannelId;
use shoplist_db::{seed_demo_list, DemoSeedResult, JsonFileSnapshotStore, ListStore, SnapshotStore};

pub const DEFAULT_CHANNEL: &str = "demo-channel";

pub fn run(channel: &str) -> CommandResult {
    let channel = channel.trim();
    if channel.is_empty() {
        return CommandResult::failure("seed", "invalid_channel", "channel id must not be empty", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let channel = ChannelId::from(channel);
    let snapshots = Arc::new(JsonFileSnapshotStore::new(&config.storage.data_dir));
    let result = block_on("seed", async {
        let store = ListStore::open(snapshots.clone()).await;
        let seeded = seed_demo_list(&store, &channel).await;

        // The store only logs write failures, so read the file back.
        let persisted = snapshots
            .load()
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        match persisted.lists.get(&channel) {
            Some(list) if list.items.len() == seeded.items => Ok(seeded),
            _ => Err((
                "seed_verification",
                format!("demo list was not written to `{}`", snapshots.lists_path().display()),
                6u8,
            )),
        }
    });

    match result {
        Ok(Ok(seeded)) => CommandResult::success("seed", seed_message(&seeded)),
        Ok(Err((error_class, message, exit_code))) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
        Err(failure) => failure,
    }
}

fn seed_message(seeded: &DemoSeedResult) -> String {
    format!(
        "seeded \"{}\" into channel {}: {} items, {} checked",
        seeded.title, seeded.channel, seeded.items, seeded.checked
    )
}

#[cfg(test)]
mod tests {
    use shoplist_core::domain::ChannelId;
    use shoplist_db::DemoSeedResult;

    use super::seed_message;

    #[test]
    fn seed_message_names_channel_and_counts() {
        let seeded = DemoSeedResult {
            channel: ChannelId::from("C-demo"),
            title: "Weekly Groceries".to_owned(),
            items: 6,
            checked: 2,
        };

        assert_eq!(
            seed_message(&seeded),
            "seeded \"Weekly Groceries\" into channel C-demo: 6 items, 2 checked"
        );
    }
}
