//! HTTP liveness endpoint.

use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::get,
    },
    tokio::net::TcpListener,
    tokio_util::sync::CancellationToken,
    tracing::info,
};

use mirrorlink_relay::MirrorService;

#[derive(Clone)]
struct AppState {
    service: Arc<MirrorService>,
}

pub fn build_router(service: Arc<MirrorService>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(AppState { service })
}

pub async fn bind(bind: &str, port: u16) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    Ok(TcpListener::bind(addr).await?)
}

/// Serve `/health` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    service: Arc<MirrorService>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "health endpoint listening");
    axum::serve(listener, build_router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.service.is_running() {
        "ok"
    } else {
        "starting"
    };
    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        // null while a link command holds the registry
        "linked": state.service.try_linked_count(),
        "mirrored": state.service.mirrored_count(),
    }))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        mirrorlink_common::ChannelId,
        mirrorlink_relay::{
            ChannelDirectory, EndpointProvider, JsonLinkStore, MirroredMessage, RelayEndpoint,
            ResolvedChannel, Result,
        },
    };

    struct OpenDirectory;

    #[async_trait]
    impl ChannelDirectory for OpenDirectory {
        async fn resolve(&self, channel_id: &ChannelId) -> Result<ResolvedChannel> {
            Ok(ResolvedChannel {
                id: channel_id.clone(),
                name: "general".into(),
                server_name: None,
            })
        }
    }

    struct NullProvider;

    #[async_trait]
    impl EndpointProvider for NullProvider {
        async fn find_named_endpoint(
            &self,
            channel_id: &ChannelId,
            _name: &str,
        ) -> Result<Option<RelayEndpoint>> {
            Ok(Some(RelayEndpoint {
                channel_id: channel_id.clone(),
                endpoint_id: format!("wh-{channel_id}"),
            }))
        }

        async fn create_endpoint(&self, channel_id: &ChannelId, _name: &str) -> Result<RelayEndpoint> {
            Ok(RelayEndpoint {
                channel_id: channel_id.clone(),
                endpoint_id: format!("wh-{channel_id}"),
            })
        }

        async fn send(&self, _endpoint: &RelayEndpoint, _payload: &MirroredMessage) -> Result<()> {
            Ok(())
        }
    }

    async fn get_health(service: Arc<MirrorService>) -> serde_json::Value {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(listener, service, shutdown.clone()));

        let body = reqwest::get(format!("http://{addr}/health"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        shutdown.cancel();
        server.await.unwrap().unwrap();
        serde_json::from_str(&body).unwrap()
    }

    #[tokio::test]
    async fn reports_link_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        std::fs::write(&path, r#"{"linked_channels":["1","2","3"]}"#).unwrap();

        let service = Arc::new(MirrorService::new(
            Arc::new(JsonLinkStore::new(path)),
            Arc::new(OpenDirectory),
            Arc::new(NullProvider),
            "Mirror Bot",
        ));
        service.initialize().await.unwrap();

        let health = get_health(service).await;
        assert_eq!(health["status"], "ok");
        assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(health["linked"], 3);
        assert_eq!(health["mirrored"], 3);
    }

    #[tokio::test]
    async fn uninitialized_service_is_starting() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(MirrorService::new(
            Arc::new(JsonLinkStore::new(dir.path().join("links.json"))),
            Arc::new(OpenDirectory),
            Arc::new(NullProvider),
            "Mirror Bot",
        ));

        let health = get_health(service).await;
        assert_eq!(health["status"], "starting");
        assert_eq!(health["mirrored"], 0);
    }
}
