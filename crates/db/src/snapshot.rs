use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use shoplist_core::domain::list::ShoppingList;
use shoplist_core::domain::settings::ChannelSetting;
use shoplist_core::domain::{ChannelId, GuildId};

pub const LISTS_FILE: &str = "lists.json";
pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error on `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("could not decode `{path}`: {source}")]
    Decode { path: PathBuf, source: serde_json::Error },
    #[error("could not encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Full persisted state: two independent keyed records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub lists: BTreeMap<ChannelId, ShoppingList>,
    pub settings: BTreeMap<GuildId, ChannelSetting>,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<StoreSnapshot, PersistenceError>;
    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError>;
}

/// Writes `lists.json` and `settings.json` under a data directory.
#[derive(Clone, Debug)]
pub struct JsonFileSnapshotStore {
    data_dir: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn lists_path(&self) -> PathBuf {
        self.data_dir.join(LISTS_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileSnapshotStore {
    async fn load(&self) -> Result<StoreSnapshot, PersistenceError> {
        Ok(StoreSnapshot {
            lists: read_record(&self.lists_path()).await?.unwrap_or_default(),
            settings: read_record(&self.settings_path()).await?.unwrap_or_default(),
        })
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .map_err(|source| PersistenceError::Io { path: self.data_dir.clone(), source })?;

        write_record(&self.lists_path(), &serde_json::to_vec_pretty(&snapshot.lists)?).await?;
        write_record(&self.settings_path(), &serde_json::to_vec_pretty(&snapshot.settings)?)
            .await?;
        Ok(())
    }
}

async fn read_record<T>(path: &Path) -> Result<Option<T>, PersistenceError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(PersistenceError::Io { path: path.to_path_buf(), source }),
    };

    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| PersistenceError::Decode { path: path.to_path_buf(), source })
}

async fn write_record(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let staging = path.with_extension("json.tmp");
    tokio::fs::write(&staging, bytes)
        .await
        .map_err(|source| PersistenceError::Io { path: staging.clone(), source })?;
    tokio::fs::rename(&staging, path)
        .await
        .map_err(|source| PersistenceError::Io { path: path.to_path_buf(), source })
}

/// Keeps the last saved snapshot in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    saved: StoreSnapshot,
    saves: usize,
    fail_saves: bool,
}

impl InMemorySnapshotStore {
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self { state: Mutex::new(InMemoryState { saved: snapshot, ..InMemoryState::default() }) }
    }

    pub async fn set_fail_saves(&self, fail: bool) {
        self.state.lock().await.fail_saves = fail;
    }

    pub async fn save_count(&self) -> usize {
        self.state.lock().await.saves
    }

    pub async fn saved(&self) -> StoreSnapshot {
        self.state.lock().await.saved.clone()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn load(&self) -> Result<StoreSnapshot, PersistenceError> {
        Ok(self.state.lock().await.saved.clone())
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), PersistenceError> {
        let mut state = self.state.lock().await;
        if state.fail_saves {
            return Err(PersistenceError::Unavailable("writes disabled".to_owned()));
        }
        state.saved = snapshot.clone();
        state.saves += 1;
        Ok(())
    }
}
