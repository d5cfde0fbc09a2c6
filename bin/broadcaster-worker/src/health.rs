use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chain_registry::{ChainRegistry, RpcProvider};
use coordination_store::CoordinationStore;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, ServerBindSnafu, ServerStartSnafu};
use snafu::ResultExt;

const CHECK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
struct HealthState {
    store: Arc<dyn CoordinationStore>,
    registry: Arc<ChainRegistry>,
}

#[derive(Serialize)]
struct HealthBody {
    store: bool,
    chain: bool,
}

/// `GET /health` (spec §6): 200 when the coordination store and at least one
/// chain RPC are reachable, 503 otherwise.
pub async fn run_health_server(
    addr: SocketAddr,
    store: Arc<dyn CoordinationStore>,
    registry: Arc<ChainRegistry>,
    shutdown: CancellationToken,
) -> Result<()> {
    let state = HealthState { store, registry };
    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(state);

    info!(%addr, "health endpoint listening");
    let listener = tokio::net::TcpListener::bind(addr).await.context(ServerBindSnafu)?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context(ServerStartSnafu)?;
    Ok(())
}

async fn health_handler(
    axum::extract::State(state): axum::extract::State<HealthState>,
) -> impl IntoResponse {
    let store_ok = tokio::time::timeout(CHECK_TIMEOUT, state.store.ping())
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);

    let chain_ok = check_any_chain(&state.registry).await;

    let body = HealthBody {
        store: store_ok,
        chain: chain_ok,
    };
    let status = if store_ok && chain_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn check_any_chain(registry: &ChainRegistry) -> bool {
    for chain_id in registry.chain_ids() {
        let Some((chain, network)) = registry.name_for_chain_id(chain_id) else {
            continue;
        };
        let Ok(provider) = registry.rpc_client(&chain, &network) else {
            continue;
        };
        match tokio::time::timeout(CHECK_TIMEOUT, provider.get_block_number()).await {
            Ok(Ok(_)) => return true,
            Ok(Err(err)) => warn!(chain_id, %err, "health check rpc call failed"),
            Err(_) => warn!(chain_id, "health check rpc call timed out"),
        }
    }
    false
}
