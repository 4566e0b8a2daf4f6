use std::path::PathBuf;
use std::sync::Arc;

use shoplist_chat::{
    GatewayRunner, NoopGatewayTransport, NoopPlatform, ReconnectPolicy, ServiceOptions,
    ShoppingService,
};
use shoplist_core::config::{AppConfig, ConfigError, LoadOptions};
use shoplist_db::{JsonFileSnapshotStore, ListStore};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<ListStore>,
    pub service: ShoppingService,
    pub runner: GatewayRunner,
    pub shutdown: CancellationToken,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("data directory `{path}` is not usable: {source}")]
    DataDir { path: PathBuf, source: std::io::Error },
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let data_dir = config.storage.data_dir.clone();
    tokio::fs::create_dir_all(&data_dir)
        .await
        .map_err(|source| BootstrapError::DataDir { path: data_dir.clone(), source })?;

    let store = Arc::new(ListStore::open(Arc::new(JsonFileSnapshotStore::new(&data_dir))).await);
    let stats = store.stats().await;
    info!(
        event_name = "system.bootstrap.store_opened",
        correlation_id = "bootstrap",
        data_dir = %data_dir.display(),
        lists = stats.lists,
        items = stats.items,
        "list store opened"
    );

    // No platform client ships with the server; adapters plug in here.
    let service = ShoppingService::new(
        store.clone(),
        Arc::new(NoopPlatform),
        ServiceOptions::from_config(&config),
    );
    let shutdown = CancellationToken::new();
    let runner = GatewayRunner::new(
        Arc::new(NoopGatewayTransport),
        service.dispatcher(),
        ReconnectPolicy::default(),
    )
    .with_shutdown(shutdown.clone());

    Ok(Application { config, store, service, runner, shutdown })
}
