use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use shoplist_db::ListStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    store: Arc<ListStore>,
    data_dir: PathBuf,
}

impl HealthState {
    pub fn new(store: Arc<ListStore>, data_dir: PathBuf) -> Self {
        Self { store, data_dir }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub storage: HealthCheck,
    pub lists: usize,
    pub items: usize,
    pub configured_guilds: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    state: HealthState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        let server = axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await });
        if let Err(error) = server.await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = storage_check(&state.data_dir).await;
    let ready = storage.status == "ready";
    let stats = state.store.stats().await;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "shoplist-server runtime initialized".to_string(),
        },
        storage,
        lists: stats.lists,
        items: stats.items,
        configured_guilds: stats.configured_guilds,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn storage_check(data_dir: &std::path::Path) -> HealthCheck {
    match tokio::fs::metadata(data_dir).await {
        Ok(metadata) if metadata.is_dir() && !metadata.permissions().readonly() => {
            HealthCheck { status: "ready", detail: format!("`{}` writable", data_dir.display()) }
        }
        Ok(_) => HealthCheck {
            status: "degraded",
            detail: format!("`{}` is not a writable directory", data_dir.display()),
        },
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("`{}` unavailable: {error}", data_dir.display()),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        extract::State,
        http::{Request, StatusCode},
        Json,
    };
    use shoplist_core::domain::ChannelId;
    use shoplist_db::ListStore;
    use tower::ServiceExt;

    use crate::health::{health, router, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_data_dir_is_usable() {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(ListStore::in_memory());
        store.create_list(&ChannelId::from("C1"), "Weekly", ["milk", "bread"]).await;

        let (status, Json(payload)) =
            health(State(HealthState::new(store, data_dir.path().to_path_buf()))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.storage.status, "ready");
        assert_eq!(payload.service.status, "ready");
        assert_eq!((payload.lists, payload.items), (1, 2));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_when_data_dir_is_missing() {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let missing = data_dir.path().join("gone");

        let (status, Json(payload)) =
            health(State(HealthState::new(Arc::new(ListStore::in_memory()), missing))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.storage.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn router_serves_health_as_json() {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let app = router(HealthState::new(
            Arc::new(ListStore::in_memory()),
            data_dir.path().to_path_buf(),
        ));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["lists"], 0);
    }
}
