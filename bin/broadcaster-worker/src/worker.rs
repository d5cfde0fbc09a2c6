use std::sync::Arc;
use std::time::Duration;

use broadcast_models::{
    BroadcastError, BroadcastStatus, ChainContext, QueuedTransaction, RequestStatus,
    UpstreamMessage,
};
use chain_registry::ChainRegistry;
use coordination_store::CoordinationStore;
use nonce_manager::{fairness_order, NonceManager, ProcessOutcome, SenderWorkload};
use queue_client::{DlqQueue, ReceivedMessage, ResultQueue, UpstreamPayload, UpstreamQueue};
use retry_policy::{NonceConflictKind, RetryPolicy};
use rpc_broadcaster::{parse_signed_payload, RpcBroadcaster};
use state_store::StateStore;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::result_emitter::{
    dlq_message, failure_result, nonce_gap_info, request_status_for, sent_record, success_result,
    upstream_message_from_malformed, upstream_message_from_queued,
};

const LOCK_SWEEP_TIMEOUT: Duration = Duration::from_secs(60);

/// `spec.md` §4.6: long-polls the upstream queue, feeds the Nonce Manager,
/// drives the Broadcaster for ready transactions, and routes failures to
/// retry-in-place or DLQ.
pub struct WorkerLoop {
    owner: String,
    upstream: Arc<dyn UpstreamQueue>,
    results: Arc<dyn ResultQueue>,
    dlq: Arc<dyn DlqQueue>,
    store: Arc<dyn CoordinationStore>,
    registry: Arc<ChainRegistry>,
    nonce_manager: Arc<NonceManager>,
    state_store: Arc<StateStore>,
    retry_policy: RetryPolicy,
    poll_batch_size: i32,
    poll_wait_seconds: i32,
    sweep_interval: Duration,
    concurrency: Arc<Semaphore>,
    store_unavailable_max_retries: u32,
}

#[allow(clippy::too_many_arguments)]
impl WorkerLoop {
    pub fn new(
        upstream: Arc<dyn UpstreamQueue>,
        results: Arc<dyn ResultQueue>,
        dlq: Arc<dyn DlqQueue>,
        store: Arc<dyn CoordinationStore>,
        registry: Arc<ChainRegistry>,
        nonce_manager: Arc<NonceManager>,
        state_store: Arc<StateStore>,
        retry_policy: RetryPolicy,
        poll_batch_size: i32,
        poll_wait_seconds: i32,
        sweep_interval: Duration,
        max_concurrency: usize,
        store_unavailable_max_retries: u32,
    ) -> Self {
        Self {
            owner: format!("worker-{}", Uuid::new_v4()),
            upstream,
            results,
            dlq,
            store,
            registry,
            nonce_manager,
            state_store,
            retry_policy,
            poll_batch_size,
            poll_wait_seconds,
            sweep_interval,
            concurrency: Arc::new(Semaphore::new(max_concurrency.max(1))),
            store_unavailable_max_retries,
        }
    }

    /// Runs until `shutdown` is cancelled. In-flight drains are allowed to
    /// finish their current broadcast; no new message is accepted from the
    /// upstream queue once the flag flips.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let sweeper = {
            let this = self.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { this.run_sweep_loop(shutdown).await })
        };

        let mut tasks: JoinSet<()> = JoinSet::new();
        while !shutdown.is_cancelled() {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.upstream.receive(self.poll_batch_size, self.poll_wait_seconds) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(err) => {
                    warn!(%err, "upstream receive failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            for message in messages {
                let permit = self.concurrency.clone().acquire_owned().await.expect("semaphore not closed");
                let this = self.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    this.handle_message(message).await;
                });
            }

            while tasks.try_join_next().is_some() {}
        }

        while tasks.join_next().await.is_some() {}
        sweeper.abort();
    }

    async fn run_sweep_loop(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {}
            }
            self.sweep_once().await;
        }
    }

    /// `spec.md` §4.6 step 3 plus the lock-expiry sweep from §4.5.
    async fn sweep_once(&self) {
        match self.store.sweep_expired_locks(LOCK_SWEEP_TIMEOUT).await {
            Ok(released) if !released.is_empty() => {
                info!(senders = ?released, "swept expired processing locks");
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "lock sweep failed"),
        }

        for sender in self.nonce_manager.sweep_gap_timers() {
            warn!(sender, "gap timer expired without resolution; signalling recovery collaborator");
        }

        let senders = match self.store.list_senders_with_pending().await {
            Ok(senders) => senders,
            Err(err) => {
                warn!(%err, "failed to enumerate senders with pending work");
                return;
            }
        };
        let locked = self.store.list_senders_with_locks().await.unwrap_or_default();

        let mut workloads = Vec::with_capacity(senders.len());
        for sender in senders {
            let pending_len = self.store.get_pending(&sender).await.map(|p| p.len()).unwrap_or(0);
            let last_processed_at = self.store.last_processed(&sender).await.unwrap_or(None);
            let sender_locked = locked.contains(&sender);
            workloads.push(SenderWorkload {
                sender,
                pending_len,
                locked: sender_locked,
                last_processed_at,
            });
        }

        for workload in fairness_order(workloads) {
            if locked.contains(&workload.sender) {
                continue;
            }
            if let Some(chain_ctx) = self.chain_context_for_sender(&workload.sender).await {
                self.drain_sender(&workload.sender, &chain_ctx).await;
            }
        }
    }

    async fn chain_context_for_sender(&self, sender: &str) -> Option<ChainContext> {
        let pending = self.store.get_pending(sender).await.ok()?;
        pending.first().map(|tx| tx.chain_context.clone())
    }

    #[instrument(skip(self, message))]
    async fn handle_message(&self, message: ReceivedMessage<UpstreamPayload>) {
        let upstream_msg = match message.body {
            UpstreamPayload::Decoded(msg) => msg,
            UpstreamPayload::Malformed { raw_body, reason } => {
                self.route_malformed_raw(&raw_body, &message.receipt_handle, &reason).await;
                return;
            }
        };
        let parsed = parse_signed_payload(&upstream_msg.signed_payload);
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                self.route_malformed(&upstream_msg, &message.receipt_handle, &err.to_string()).await;
                return;
            }
        };

        let chain_ctx = match upstream_msg.chain_id {
            Some(chain_id) if chain_id == parsed.chain_id => ChainContext {
                chain: upstream_msg.chain.clone(),
                network: upstream_msg.network.clone(),
                chain_id,
            },
            Some(_) => {
                self.route_malformed(
                    &upstream_msg,
                    &message.receipt_handle,
                    "declared chain_id does not match signed payload",
                )
                .await;
                return;
            }
            None => ChainContext {
                chain: upstream_msg.chain.clone(),
                network: upstream_msg.network.clone(),
                chain_id: parsed.chain_id,
            },
        };

        let tx = QueuedTransaction {
            signed_payload: upstream_msg.signed_payload.clone(),
            tx_hash: parsed.tx_hash,
            nonce: parsed.nonce,
            sender_address: parsed.sender_address.clone(),
            chain_context: chain_ctx.clone(),
            request_id: upstream_msg.request_id.clone(),
            kind: upstream_msg.kind,
            batch_id: upstream_msg.batch_id.clone(),
            enqueued_at: chrono::Utc::now(),
            priority: 0,
        };

        let sender = tx.sender_address.clone();
        match self.nonce_manager.insert(&chain_ctx, tx).await {
            Ok(_) => {
                if let Err(err) = self.upstream.delete(&message.receipt_handle).await {
                    warn!(%err, "failed to delete upstream message after durable insert");
                }
            }
            Err(err) => {
                warn!(%err, "nonce manager insert failed, leaving message for redelivery");
                return;
            }
        }

        if self.store.list_senders_with_locks().await.unwrap_or_default().iter().any(|s| s == &sender) {
            return;
        }
        self.drain_sender(&sender, &chain_ctx).await;
    }

    async fn route_malformed(
        &self,
        upstream_msg: &UpstreamMessage,
        receipt_handle: &str,
        reason: &str,
    ) {
        error!(reason, "malformed upstream message");
        let dlq = dlq_message(upstream_msg.clone(), "Validation", "MalformedMessage", reason, None, 0);
        if self.dlq.send_to_dlq(&dlq).await.is_ok() {
            let _ = self.upstream.delete(receipt_handle).await;
        }
    }

    /// Like [`Self::route_malformed`], for a body that never deserialized at
    /// all — there's no `UpstreamMessage` to wrap, so one is synthesized from
    /// the raw text (spec §7 "no silent drops": every body still reaches the
    /// DLQ, decodable or not).
    async fn route_malformed_raw(&self, raw_body: &str, receipt_handle: &str, reason: &str) {
        self.route_malformed(&upstream_message_from_malformed(raw_body), receipt_handle, reason).await;
    }

    #[instrument(skip(self, chain_ctx), fields(sender))]
    async fn drain_sender(&self, sender: &str, chain_ctx: &ChainContext) {
        loop {
            let outcome = match self.nonce_manager.process_next(sender, chain_ctx, &self.owner).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(%err, "process_next failed");
                    return;
                }
            };

            let tx = match outcome {
                ProcessOutcome::Gap { waiting_for } => {
                    info!(waiting_for, "sender gapped, stopping drain");
                    return;
                }
                ProcessOutcome::Ready(tx) => tx,
            };

            if !self.process_ready(sender, chain_ctx, tx).await {
                return;
            }
        }
    }

    /// Returns `true` if the caller should keep draining this sender.
    async fn process_ready(&self, sender: &str, chain_ctx: &ChainContext, tx: QueuedTransaction) -> bool {
        let tx_key = tx.tx_key();

        let begun = match self.store.try_begin_processing(&tx_key).await {
            Ok(begun) => begun,
            Err(err) => {
                warn!(%err, "try_begin_processing failed");
                let _ = self.nonce_manager.on_broadcast_transient(sender).await;
                return false;
            }
        };
        if !begun {
            info!(tx_key, "duplicate delivery already in flight, skipping");
            let _ = self.nonce_manager.on_broadcast_transient(sender).await;
            return false;
        }

        let keep_draining = self.broadcast_one(sender, chain_ctx, &tx).await;
        let _ = self.store.end_processing(&tx_key).await;
        keep_draining
    }

    async fn broadcast_one(&self, sender: &str, chain_ctx: &ChainContext, tx: &QueuedTransaction) -> bool {
        let tx_key = tx.tx_key();

        if let Ok(Some(hash)) = self.store.is_broadcasted(&tx_key).await {
            info!(tx_key, %hash, "already broadcasted, short-circuiting");
            self.emit_success(tx, &hash, None).await;
            let _ = self.nonce_manager.on_broadcast_success(sender, tx.nonce).await;
            return true;
        }

        let provider = match self.registry.rpc_client(&chain_ctx.chain, &chain_ctx.network) {
            Ok(provider) => provider,
            Err(err) => {
                error!(%err, "chain registry could not produce an rpc client");
                self.emit_failure(tx, &err.to_string()).await;
                let _ = self.nonce_manager.on_broadcast_permanent(sender, chain_ctx.chain_id, tx.nonce).await;
                return true;
            }
        };
        let broadcaster = RpcBroadcaster::new(provider, chain_ctx.chain_id);

        let _ = self.state_store.update_status(&tx.request_id, RequestStatus::Broadcasting).await;

        let mut attempt = 0u32;
        loop {
            match broadcaster.broadcast(&tx.signed_payload).await {
                Ok(outcome) => {
                    let _ = self.store.mark_broadcasted(&tx_key, &outcome.tx_hash).await;
                    self.emit_success(tx, &outcome.tx_hash, None).await;
                    let _ = self.nonce_manager.on_broadcast_success(sender, tx.nonce).await;
                    return true;
                }
                Err(err) => {
                    if let Some(conflict) = self.retry_policy.detect_nonce_conflict(&err) {
                        return self.handle_nonce_conflict(sender, chain_ctx, tx, &err, conflict.kind).await;
                    }
                    if err.is_permanent_class() {
                        return self.handle_permanent(sender, chain_ctx, tx, &err).await;
                    }

                    let decision = self.retry_policy.should_retry(&err, attempt);
                    if decision.retry {
                        warn!(attempt, delay = decision.delay_seconds, %err, "transient broadcast error, retrying in place");
                        tokio::time::sleep(Duration::from_secs_f64(decision.delay_seconds)).await;
                        attempt += 1;
                        continue;
                    }
                    return self.handle_transient_exhausted(sender, tx, &err).await;
                }
            }
        }
    }

    async fn handle_nonce_conflict(
        &self,
        sender: &str,
        chain_ctx: &ChainContext,
        tx: &QueuedTransaction,
        err: &BroadcastError,
        kind: NonceConflictKind,
    ) -> bool {
        match kind {
            NonceConflictKind::TooHigh => {
                let (expected, actual) = match err {
                    BroadcastError::NonceTooHigh { expected, actual } => (*expected, *actual),
                    _ => (tx.nonce, tx.nonce),
                };
                let gap_info = nonce_gap_info(expected, actual);
                let dlq = dlq_message(
                    upstream_message_from_queued(tx),
                    "NonceTooHigh",
                    "nonce_gap",
                    &err.to_string(),
                    Some(gap_info),
                    0,
                );
                let _ = self.dlq.send_to_dlq(&dlq).await;
                let _ = self.nonce_manager.on_nonce_too_high(sender, tx.clone()).await;
                false
            }
            NonceConflictKind::TooLow | NonceConflictKind::Pending => {
                self.handle_permanent(sender, chain_ctx, tx, err).await
            }
        }
    }

    async fn handle_permanent(
        &self,
        sender: &str,
        chain_ctx: &ChainContext,
        tx: &QueuedTransaction,
        err: &BroadcastError,
    ) -> bool {
        error!(%err, "permanent broadcast failure");
        self.emit_failure(tx, &err.to_string()).await;
        let _ = self
            .state_store
            .update_status_with_error(&tx.request_id, RequestStatus::Failed, &err.to_string())
            .await;
        let _ = self
            .nonce_manager
            .on_broadcast_permanent(sender, chain_ctx.chain_id, tx.nonce)
            .await;
        true
    }

    async fn handle_transient_exhausted(&self, sender: &str, tx: &QueuedTransaction, err: &BroadcastError) -> bool {
        let retry_count = self.store.increment_retry(&tx.request_id).await.unwrap_or(0);
        warn!(%err, retry_count, "broadcast retries exhausted for this attempt");

        if retry_count > self.store_unavailable_max_retries as u64 {
            let dlq = dlq_message(
                upstream_message_from_queued(tx),
                "Network",
                "retries_exhausted",
                &err.to_string(),
                None,
                retry_count as u32,
            );
            if self.dlq.send_to_dlq(&dlq).await.is_ok() {
                self.emit_failure(tx, &err.to_string()).await;
                let _ = self
                    .state_store
                    .update_status_with_error(&tx.request_id, RequestStatus::Failed, &err.to_string())
                    .await;
                let _ = self.nonce_manager.on_broadcast_transient(sender).await;
            }
        } else {
            let _ = self.nonce_manager.on_broadcast_transient(sender).await;
        }
        false
    }

    async fn emit_success(&self, tx: &QueuedTransaction, broadcast_hash: &str, block_number: Option<u64>) {
        let msg = success_result(tx, broadcast_hash, block_number);
        if let Err(err) = self.results.send_result(&msg).await {
            error!(%err, "failed to emit success result");
        }
        let record = sent_record(tx, BroadcastStatus::Broadcasted, Some(broadcast_hash.to_string()), None, block_number);
        if let Err(err) = self.state_store.save_sent_transaction(&record).await {
            error!(%err, "failed to persist sent transaction record");
        }
        let _ = self
            .state_store
            .update_status(&tx.request_id, request_status_for(BroadcastStatus::Broadcasted))
            .await;
    }

    async fn emit_failure(&self, tx: &QueuedTransaction, error_message: &str) {
        let msg = failure_result(tx, error_message);
        if let Err(err) = self.results.send_result(&msg).await {
            error!(%err, "failed to emit failure result");
        }
        let record = sent_record(tx, BroadcastStatus::Failed, None, Some(error_message.to_string()), None);
        if let Err(err) = self.state_store.save_sent_transaction(&record).await {
            error!(%err, "failed to persist sent transaction record");
        }
    }
}
