pub mod config;
pub mod error;
pub mod health;
pub mod result_emitter;
pub mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chain_registry::{ChainRegistry, ChainTable};
use coordination_store::{CoordinationStore, RedisCoordinationStore};
use nonce_manager::NonceManager;
use queue_client::{SqsDlqQueue, SqsResultQueue, SqsUpstreamQueue};
use retry_policy::{RetryPolicy, RetryPolicyConfig};
use snafu::ResultExt;
use state_store::StateStore;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use config::Args;
pub use error::{Error, Result};

use error::{ChainRegistrySnafu, ChainTableSnafu, CoordinationStoreSnafu, StateStoreSnafu};

/// Wires every external collaborator named in `spec.md` §6 and runs the
/// Worker Loop and health endpoint until `shutdown` is cancelled (spec §4.6
/// "Shutdown").
pub async fn run(args: Args, shutdown: CancellationToken) -> Result<()> {
    let chain_table_raw = std::fs::read_to_string(&args.chain_table_path).context(ChainTableSnafu)?;
    let chain_table = ChainTable::load_from_str(&chain_table_raw).context(ChainRegistrySnafu)?;
    let registry = Arc::new(ChainRegistry::new(chain_table));

    let store: Arc<dyn CoordinationStore> = Arc::new(
        RedisCoordinationStore::connect(&args.redis_url())
            .await
            .context(CoordinationStoreSnafu)?,
    );

    let state_store = Arc::new(
        StateStore::connect(&args.database_url)
            .await
            .context(StateStoreSnafu)?,
    );

    let aws_config = {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(args.aws_region.clone()));
        if let Some(endpoint) = &args.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        loader.load().await
    };
    let sqs_client = aws_sdk_sqs::Client::new(&aws_config);

    let upstream = Arc::new(SqsUpstreamQueue::new(sqs_client.clone(), args.signed_tx_queue_url.clone()));
    let results = Arc::new(SqsResultQueue::new(sqs_client.clone(), args.broadcast_tx_queue_url.clone()));
    let dlq = Arc::new(SqsDlqQueue::new(sqs_client, args.signed_tx_dlq_url.clone()));

    let nonce_manager = Arc::new(NonceManager::new(store.clone(), registry.clone()));

    let retry_policy = RetryPolicy::new(RetryPolicyConfig {
        max_retries: args.retry_max_retries,
        base_delay_seconds: args.retry_base_delay_seconds,
        max_delay_seconds: args.retry_max_delay_seconds,
        multiplier: args.retry_multiplier,
    });

    let worker = Arc::new(worker::WorkerLoop::new(
        upstream,
        results,
        dlq,
        store.clone(),
        registry.clone(),
        nonce_manager,
        state_store,
        retry_policy,
        args.poll_batch_size,
        args.poll_wait_seconds,
        Duration::from_secs(args.sweep_interval_seconds),
        args.max_concurrency,
        args.store_unavailable_max_retries,
    ));

    let health_addr = SocketAddr::from((args.host, args.port));
    let health_shutdown = shutdown.clone();
    let health_store = store.clone();
    let health_registry = registry.clone();
    let health_task = tokio::spawn(async move {
        if let Err(err) = health::run_health_server(health_addr, health_store, health_registry, health_shutdown).await
        {
            tracing::error!(%err, "health endpoint exited with an error");
        }
    });

    info!("broadcaster worker starting");
    worker.run(shutdown).await;

    health_task.abort();
    Ok(())
}
