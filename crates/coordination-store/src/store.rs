use std::time::Duration;

use async_trait::async_trait;
use broadcast_models::QueuedTransaction;
use chrono::Utc;
use redis::{aio::MultiplexedConnection, AsyncCommands};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{ContentionExceededSnafu, Result};
use crate::keys;

const LOCK_TTL_SECS: u64 = 60;
const PROCESSING_TTL_SECS: u64 = 5 * 60;
const BROADCASTED_TTL_SECS: u64 = 60 * 60;
const RETRY_TTL_SECS: u64 = 24 * 60 * 60;
const MAX_MERGE_ATTEMPTS: u32 = 3;

/// Typed façade over the shared coordination key-value store (spec §4.1).
/// Every method here maps to exactly one namespaced key pattern; no method
/// does cross-key business logic beyond what's needed for atomicity.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get_pending(&self, sender: &str) -> Result<Vec<QueuedTransaction>>;
    async fn set_pending(&self, sender: &str, list: &[QueuedTransaction]) -> Result<()>;
    /// Commutative insert-or-replace-by-priority, safe to call without
    /// holding the sender's processing lock (spec §5). Retries on
    /// concurrent-writer contention with backoff, up to
    /// [`MAX_MERGE_ATTEMPTS`].
    async fn merge_pending_insert(
        &self,
        sender: &str,
        incoming: QueuedTransaction,
    ) -> Result<Vec<QueuedTransaction>>;

    async fn get_cursor(&self, sender: &str) -> Result<Option<u64>>;
    async fn set_cursor(&self, sender: &str, nonce: u64) -> Result<()>;

    async fn acquire_lock(&self, sender: &str, owner: &str) -> Result<bool>;
    async fn release_lock(&self, sender: &str) -> Result<()>;
    async fn touch_last_processed(&self, sender: &str) -> Result<()>;
    async fn last_processed(&self, sender: &str) -> Result<Option<chrono::DateTime<Utc>>>;

    async fn list_senders_with_pending(&self) -> Result<Vec<String>>;
    async fn list_senders_with_locks(&self) -> Result<Vec<String>>;
    /// Releases locks whose `lockStartedAt` age exceeds `timeout`; returns
    /// the senders that were released.
    async fn sweep_expired_locks(&self, timeout: Duration) -> Result<Vec<String>>;

    async fn is_broadcasted(&self, tx_key: &str) -> Result<Option<String>>;
    async fn mark_broadcasted(&self, tx_key: &str, hash: &str) -> Result<()>;

    async fn try_begin_processing(&self, tx_key: &str) -> Result<bool>;
    async fn end_processing(&self, tx_key: &str) -> Result<()>;

    async fn increment_retry(&self, msg_id: &str) -> Result<u64>;

    async fn pool_add(&self, chain_id: u64, sender: &str, nonce: u64) -> Result<()>;
    async fn pool_smallest(&self, chain_id: u64, sender: &str) -> Result<Option<u64>>;
    async fn pool_remove(&self, chain_id: u64, sender: &str, nonce: u64) -> Result<()>;

    /// Liveness check for the health endpoint; any successful round trip
    /// counts, independent of the keyspace.
    async fn ping(&self) -> Result<()>;
}

pub struct RedisCoordinationStore {
    // `redis`'s MultiplexedConnection is itself cheaply cloneable and safe
    // for concurrent use, but the CAS retry loop issues WATCH/MULTI/EXEC as
    // a sequence that must not interleave with another caller's WATCH on
    // the same logical connection, so callers share one guarded handle.
    con: Mutex<MultiplexedConnection>,
}

impl RedisCoordinationStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let con = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { con: Mutex::new(con) })
    }

    #[cfg(test)]
    pub(crate) fn from_connection(con: MultiplexedConnection) -> Self {
        Self { con: Mutex::new(con) }
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordinationStore {
    async fn get_pending(&self, sender: &str) -> Result<Vec<QueuedTransaction>> {
        let mut con = self.con.lock().await;
        let raw: Option<String> = con.get(keys::pending(sender)).await?;
        Ok(match raw {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        })
    }

    async fn set_pending(&self, sender: &str, list: &[QueuedTransaction]) -> Result<()> {
        let mut con = self.con.lock().await;
        let key = keys::pending(sender);
        if list.is_empty() {
            let _: () = con.del(key).await?;
        } else {
            let raw = serde_json::to_string(list)?;
            let _: () = con.set(key, raw).await?;
        }
        Ok(())
    }

    async fn merge_pending_insert(
        &self,
        sender: &str,
        incoming: QueuedTransaction,
    ) -> Result<Vec<QueuedTransaction>> {
        let key = keys::pending(sender);
        let mut con = self.con.lock().await;

        for attempt in 0..MAX_MERGE_ATTEMPTS {
            let _: () = redis::cmd("WATCH").arg(&key).query_async(&mut *con).await?;

            let raw: Option<String> = con.get(&key).await?;
            let mut list: Vec<QueuedTransaction> = match raw {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Vec::new(),
            };

            match list.iter().position(|tx| tx.nonce == incoming.nonce) {
                Some(idx) => {
                    if incoming.priority >= list[idx].priority {
                        list[idx] = incoming.clone();
                    }
                }
                None => list.push(incoming.clone()),
            }
            list.sort_by_key(|tx| tx.nonce);

            let new_raw = serde_json::to_string(&list)?;
            let mut pipe = redis::pipe();
            pipe.atomic().set(&key, new_raw);
            let result: Option<()> = pipe.query_async(&mut *con).await?;

            match result {
                Some(_) => return Ok(list),
                None => {
                    warn!(sender, attempt, "pending list merge contended, retrying");
                    tokio::time::sleep(Duration::from_millis(50 * 2u64.pow(attempt))).await;
                }
            }
        }

        let _: () = redis::cmd("UNWATCH").query_async(&mut *con).await?;
        ContentionExceededSnafu {
            sender: sender.to_string(),
            attempts: MAX_MERGE_ATTEMPTS,
        }
        .fail()
    }

    async fn get_cursor(&self, sender: &str) -> Result<Option<u64>> {
        let mut con = self.con.lock().await;
        Ok(con.get(keys::cursor(sender)).await?)
    }

    async fn set_cursor(&self, sender: &str, nonce: u64) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: () = con.set(keys::cursor(sender), nonce).await?;
        Ok(())
    }

    async fn acquire_lock(&self, sender: &str, owner: &str) -> Result<bool> {
        let mut con = self.con.lock().await;
        let acquired: bool = redis::cmd("SET")
            .arg(keys::lock(sender))
            .arg(owner)
            .arg("NX")
            .arg("EX")
            .arg(LOCK_TTL_SECS)
            .query_async::<Option<String>>(&mut *con)
            .await?
            .is_some();
        if acquired {
            let _: () = con
                .set_ex(
                    keys::lock_started_at(sender),
                    Utc::now().to_rfc3339(),
                    LOCK_TTL_SECS,
                )
                .await?;
        }
        Ok(acquired)
    }

    async fn release_lock(&self, sender: &str) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: () = con.del(keys::lock(sender)).await?;
        let _: () = con.del(keys::lock_started_at(sender)).await?;
        Ok(())
    }

    async fn touch_last_processed(&self, sender: &str) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: () = con
            .set(keys::last_processed(sender), Utc::now().to_rfc3339())
            .await?;
        Ok(())
    }

    async fn last_processed(&self, sender: &str) -> Result<Option<chrono::DateTime<Utc>>> {
        let mut con = self.con.lock().await;
        let raw: Option<String> = con.get(keys::last_processed(sender)).await?;
        Ok(raw.and_then(|raw| chrono::DateTime::parse_from_rfc3339(&raw).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    async fn list_senders_with_pending(&self) -> Result<Vec<String>> {
        let mut con = self.con.lock().await;
        let found: Vec<String> = con.keys("pending:*").await?;
        Ok(found
            .iter()
            .filter_map(|k| keys::sender_from_pending_key(k).map(String::from))
            .collect())
    }

    async fn list_senders_with_locks(&self) -> Result<Vec<String>> {
        let mut con = self.con.lock().await;
        let found: Vec<String> = con.keys("lock:*").await?;
        Ok(found
            .iter()
            .filter_map(|k| keys::sender_from_lock_key(k).map(String::from))
            .collect())
    }

    async fn sweep_expired_locks(&self, timeout: Duration) -> Result<Vec<String>> {
        let senders = self.list_senders_with_locks().await?;
        let mut released = Vec::new();
        for sender in senders {
            let mut con = self.con.lock().await;
            let raw: Option<String> = con.get(keys::lock_started_at(&sender)).await?;
            drop(con);
            let Some(raw) = raw else {
                // Lock exists with no start marker (clock skew / partial
                // write); treat it as expired defensively.
                self.release_lock(&sender).await?;
                released.push(sender);
                continue;
            };
            let Ok(started_at) = chrono::DateTime::parse_from_rfc3339(&raw) else {
                self.release_lock(&sender).await?;
                released.push(sender);
                continue;
            };
            let age = Utc::now().signed_duration_since(started_at.with_timezone(&Utc));
            if age.to_std().unwrap_or(Duration::ZERO) > timeout {
                debug!(sender, age_secs = age.num_seconds(), "sweeping expired lock");
                self.release_lock(&sender).await?;
                released.push(sender);
            }
        }
        Ok(released)
    }

    async fn is_broadcasted(&self, tx_key: &str) -> Result<Option<String>> {
        let mut con = self.con.lock().await;
        Ok(con.get(keys::broadcasted(tx_key)).await?)
    }

    async fn mark_broadcasted(&self, tx_key: &str, hash: &str) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: () = con
            .set_ex(keys::broadcasted(tx_key), hash, BROADCASTED_TTL_SECS)
            .await?;
        Ok(())
    }

    async fn try_begin_processing(&self, tx_key: &str) -> Result<bool> {
        let mut con = self.con.lock().await;
        let acquired: bool = redis::cmd("SET")
            .arg(keys::processing(tx_key))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(PROCESSING_TTL_SECS)
            .query_async::<Option<String>>(&mut *con)
            .await?
            .is_some();
        Ok(acquired)
    }

    async fn end_processing(&self, tx_key: &str) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: () = con.del(keys::processing(tx_key)).await?;
        Ok(())
    }

    async fn increment_retry(&self, msg_id: &str) -> Result<u64> {
        let mut con = self.con.lock().await;
        let key = keys::retry(msg_id);
        let count: u64 = con.incr(&key, 1).await?;
        if count == 1 {
            let _: () = con.expire(&key, RETRY_TTL_SECS as i64).await?;
        }
        Ok(count)
    }

    async fn pool_add(&self, chain_id: u64, sender: &str, nonce: u64) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: () = con.sadd(keys::pool(chain_id, sender), nonce).await?;
        Ok(())
    }

    async fn pool_smallest(&self, chain_id: u64, sender: &str) -> Result<Option<u64>> {
        let mut con = self.con.lock().await;
        let members: Vec<u64> = con.smembers(keys::pool(chain_id, sender)).await?;
        Ok(members.into_iter().min())
    }

    async fn pool_remove(&self, chain_id: u64, sender: &str, nonce: u64) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: () = con.srem(keys::pool(chain_id, sender), nonce).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut con = self.con.lock().await;
        let _: String = redis::cmd("PING").query_async(&mut *con).await?;
        Ok(())
    }
}
