use std::sync::Arc;

use crate::commands::{block_on, CommandResult};
use shoplist_core::config::{AppConfig, LoadOptions};
use shoplist_db::{JsonFileSnapshotStore, ListStore, SnapshotStore};

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "start",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let snapshots = Arc::new(JsonFileSnapshotStore::new(&config.storage.data_dir));
    let result = block_on("start", async {
        snapshots.load().await.map_err(|error| error.to_string())?;
        let store = ListStore::open(snapshots.clone()).await;
        Ok::<_, String>(store.stats().await)
    });

    match result {
        Ok(Ok(stats)) => CommandResult::success(
            "start",
            format!(
                "preflight passed: {} list(s) with {} item(s) in `{}`, {} configured guild(s)",
                stats.lists,
                stats.items,
                config.storage.data_dir.display(),
                stats.configured_guilds
            ),
        ),
        Ok(Err(message)) => CommandResult::failure("start", "storage_load", message, 4),
        Err(failure) => failure,
    }
}
