use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use broadcast_models::{ChainContext, QueuedTransaction, UpstreamMessage};
use chain_registry::{ChainRegistry, RpcProvider};
use chrono::Utc;
use coordination_store::CoordinationStore;
use dashmap::DashMap;
use rpc_broadcaster::parse_signed_payload;
use tracing::{debug, warn};

use crate::buffer::ReorderBuffer;
use crate::error::{LockContentionSnafu, NonceUnknownSnafu, Result};
use crate::types::ProcessOutcome;

const CHAIN_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const CHAIN_QUERY_RETRY_DELAYS: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];
const GAP_TIMER_TOTAL_TIMEOUT: Duration = Duration::from_secs(60);

/// Lets the Nonce Manager ask the upstream queue for messages that might fill
/// a detected gap without depending on a concrete queue implementation.
#[async_trait]
pub trait UpstreamPeek: Send + Sync {
    async fn peek(&self, max: usize) -> Vec<UpstreamMessage>;
    async fn delete(&self, receipt_handle: &str);
}

pub struct NonceManager {
    store: Arc<dyn CoordinationStore>,
    registry: Arc<ChainRegistry>,
    buffer: ReorderBuffer,
    nonce_cache: DashMap<String, u64>,
    gap_timers: DashMap<String, chrono::DateTime<Utc>>,
}

impl NonceManager {
    pub fn new(store: Arc<dyn CoordinationStore>, registry: Arc<ChainRegistry>) -> Self {
        Self {
            store,
            registry,
            buffer: ReorderBuffer::default(),
            nonce_cache: DashMap::new(),
            gap_timers: DashMap::new(),
        }
    }

    /// `spec.md` §4.5 `insert`. Returns `true` if the item's nonce matches
    /// the sender's expected nonce, meaning the caller may proceed to drain
    /// immediately instead of waiting for a gap to close.
    pub async fn insert(&self, chain_ctx: &ChainContext, tx: QueuedTransaction) -> Result<bool> {
        let sender = tx.sender_address.clone();
        self.store.merge_pending_insert(&sender, tx.clone()).await?;
        let expected = self.expected_nonce(&sender, chain_ctx).await?;
        Ok(tx.nonce == expected)
    }

    /// `spec.md` §4.5 `expectedNonce`.
    pub async fn expected_nonce(&self, sender: &str, chain_ctx: &ChainContext) -> Result<u64> {
        if let Some(smallest) = self.store.pool_smallest(chain_ctx.chain_id, sender).await? {
            return Ok(smallest);
        }
        if let Some(cached) = self.nonce_cache.get(sender) {
            return Ok(*cached);
        }
        if let Some(cursor) = self.store.get_cursor(sender).await? {
            let expected = cursor + 1;
            self.nonce_cache.insert(sender.to_string(), expected);
            return Ok(expected);
        }

        let provider = self.registry.rpc_client(&chain_ctx.chain, &chain_ctx.network)?;
        let address: alloy::primitives::Address =
            sender.parse().map_err(|_| crate::error::NonceError::NonceUnknown {
                sender: sender.to_string(),
                message: format!("{sender} is not a valid address"),
            })?;

        let mut last_err = String::new();
        for delay in std::iter::once(Duration::ZERO).chain(CHAIN_QUERY_RETRY_DELAYS) {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match tokio::time::timeout(CHAIN_QUERY_TIMEOUT, provider.get_transaction_count(address)).await {
                Ok(Ok(count)) => {
                    self.nonce_cache.insert(sender.to_string(), count);
                    return Ok(count);
                }
                Ok(Err(e)) => last_err = e.to_string(),
                Err(_) => last_err = "timed out".to_string(),
            }
        }

        NonceUnknownSnafu {
            sender: sender.to_string(),
            message: last_err,
        }
        .fail()
    }

    /// `spec.md` §4.5 `processNext`.
    pub async fn process_next(
        &self,
        sender: &str,
        chain_ctx: &ChainContext,
        owner: &str,
    ) -> Result<ProcessOutcome> {
        loop {
            if !self.store.acquire_lock(sender, owner).await? {
                return LockContentionSnafu {
                    sender: sender.to_string(),
                }
                .fail();
            }

            let expected = match self.expected_nonce(sender, chain_ctx).await {
                Ok(n) => n,
                Err(e) => {
                    self.store.release_lock(sender).await?;
                    return Err(e);
                }
            };
            let pending = self.store.get_pending(sender).await?;
            let Some(head) = pending.first().cloned() else {
                self.store.release_lock(sender).await?;
                return Ok(ProcessOutcome::Gap { waiting_for: expected });
            };

            match head.nonce.cmp(&expected) {
                Ordering::Equal => return Ok(ProcessOutcome::Ready(head)),
                Ordering::Greater => {
                    let remaining: Vec<_> =
                        pending.into_iter().filter(|t| t.nonce != head.nonce).collect();
                    self.store.set_pending(sender, &remaining).await?;
                    self.buffer.insert(sender, head);
                    self.store.release_lock(sender).await?;
                    return Ok(ProcessOutcome::Gap { waiting_for: expected });
                }
                Ordering::Less => {
                    debug!(sender, stale_nonce = head.nonce, expected, "discarding stale pending head");
                    let remaining: Vec<_> =
                        pending.into_iter().filter(|t| t.nonce != head.nonce).collect();
                    self.store.set_pending(sender, &remaining).await?;
                    self.store.release_lock(sender).await?;
                    continue;
                }
            }
        }
    }

    /// `spec.md` §4.5 `onBroadcastSuccess`.
    pub async fn on_broadcast_success(&self, sender: &str, nonce: u64) -> Result<()> {
        self.store.set_cursor(sender, nonce).await?;
        self.nonce_cache.insert(sender.to_string(), nonce + 1);

        let pending = self.store.get_pending(sender).await?;
        let mut remaining: Vec<_> = pending.into_iter().filter(|t| t.nonce != nonce).collect();

        let mut cursor = nonce;
        while let Some(drained) = self.buffer.take_if_next(sender, cursor + 1) {
            cursor += 1;
            self.nonce_cache.insert(sender.to_string(), cursor + 1);
            remaining.push(drained);
        }
        remaining.sort_by_key(|t| t.nonce);
        self.store.set_pending(sender, &remaining).await?;

        if self.buffer.is_empty(sender) {
            self.gap_timers.remove(sender);
        }
        self.store.touch_last_processed(sender).await?;
        self.store.release_lock(sender).await?;
        Ok(())
    }

    /// `spec.md` §4.5 `onBroadcastTransient`.
    pub async fn on_broadcast_transient(&self, sender: &str) -> Result<()> {
        self.store.release_lock(sender).await?;
        Ok(())
    }

    /// `spec.md` §4.5 `onBroadcastPermanent`.
    pub async fn on_broadcast_permanent(&self, sender: &str, chain_id: u64, nonce: u64) -> Result<()> {
        let pending = self.store.get_pending(sender).await?;
        let remaining: Vec<_> = pending.into_iter().filter(|t| t.nonce != nonce).collect();
        self.store.set_pending(sender, &remaining).await?;
        self.store.pool_add(chain_id, sender, nonce).await?;
        self.store.release_lock(sender).await?;
        Ok(())
    }

    /// `spec.md` §4.5 `onNonceTooHigh`. Invoked after a broadcast attempt was
    /// rejected as a future nonce; the lock is still held from `process_next`
    /// and is released here.
    pub async fn on_nonce_too_high(&self, sender: &str, tx: QueuedTransaction) -> Result<()> {
        let pending = self.store.get_pending(sender).await?;
        let remaining: Vec<_> = pending.into_iter().filter(|t| t.nonce != tx.nonce).collect();
        self.store.set_pending(sender, &remaining).await?;
        self.buffer.insert(sender, tx);
        self.gap_timers.entry(sender.to_string()).or_insert_with(Utc::now);
        self.store.release_lock(sender).await?;
        Ok(())
    }

    /// Ticks every sender's gap timer; returns senders whose buffer head was
    /// discarded because the 60s total timeout elapsed with the gap still
    /// unresolved (signal only — resolving the gap is a recovery
    /// collaborator's job, out of scope here).
    pub fn sweep_gap_timers(&self) -> Vec<String> {
        let mut timed_out = Vec::new();
        self.gap_timers.retain(|sender, started_at| {
            let elapsed = Utc::now().signed_duration_since(*started_at);
            if elapsed.to_std().unwrap_or(Duration::ZERO) > GAP_TIMER_TOTAL_TIMEOUT {
                if let Some(discarded) = self.buffer.pop_smallest(sender) {
                    warn!(sender, nonce = discarded.nonce, "gap timer expired, discarding buffer head");
                    timed_out.push(sender.clone());
                }
                false
            } else {
                true
            }
        });
        timed_out
    }

    /// `spec.md` §4.5 `searchUpstreamForMissing`.
    pub async fn search_upstream_for_missing(
        &self,
        sender: &str,
        missing: &[u64],
        chain_ctx: &ChainContext,
        peek: &dyn UpstreamPeek,
        max_peek: usize,
    ) -> Vec<u64> {
        let mut found = Vec::new();
        for msg in peek.peek(max_peek).await {
            if msg.chain != chain_ctx.chain || msg.network != chain_ctx.network {
                continue;
            }
            let Ok(parsed) = parse_signed_payload(&msg.signed_payload) else {
                continue;
            };
            if parsed.sender_address != sender || !missing.contains(&parsed.nonce) {
                continue;
            }
            self.buffer.insert(
                sender,
                QueuedTransaction {
                    signed_payload: msg.signed_payload.clone(),
                    tx_hash: parsed.tx_hash,
                    nonce: parsed.nonce,
                    sender_address: parsed.sender_address,
                    chain_context: chain_ctx.clone(),
                    request_id: msg.request_id.clone(),
                    kind: msg.kind,
                    batch_id: msg.batch_id.clone(),
                    enqueued_at: Utc::now(),
                    priority: 0,
                },
            );
            found.push(parsed.nonce);
            if let Some(handle) = &msg.receipt_handle {
                peek.delete(handle).await;
            }
        }
        found
    }
}
