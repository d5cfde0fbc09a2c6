use std::time::Duration;

use broadcast_models::{RequestStatus, SentTransactionRecord};
use chrono::{DateTime, Utc};
use snafu::ResultExt;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::migrate::Migrator;
use tracing::info;
use uuid::Uuid;

use crate::error::{MigrationSnafu, NotFoundSnafu, QuerySnafu, Result};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Relational record of upstream request lifecycle and broadcast outcomes
/// (spec §6). One `StateStore` per process, cloned freely — `PgPool` is
/// itself a connection-pool handle.
#[derive(Clone)]
pub struct StateStore {
    pool: PgPool,
}

impl StateStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        info!("connecting to state store database");
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .context(QuerySnafu)?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        info!("running state store migrations");
        MIGRATOR.run(&pool).await.context(MigrationSnafu)?;
        Ok(Self { pool })
    }

    pub async fn create_request(
        &self,
        request_id: &str,
        batch_id: Option<&str>,
        signed_payload: &str,
        chain: &str,
        network: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO broadcast_requests
                (request_id, batch_id, status, signed_payload, chain, network)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (request_id) DO NOTHING
            "#,
        )
        .bind(request_id)
        .bind(batch_id)
        .bind(RequestStatus::Signed.as_db_str())
        .bind(signed_payload)
        .bind(chain)
        .bind(network)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_status(&self, request_id: &str, status: RequestStatus) -> Result<()> {
        sqlx::query(
            "UPDATE broadcast_requests SET status = $1, updated_at = now() WHERE request_id = $2",
        )
        .bind(status.as_db_str())
        .bind(request_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_status_with_error(
        &self,
        request_id: &str,
        status: RequestStatus,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE broadcast_requests
            SET status = $1, error_message = $2, updated_at = now()
            WHERE request_id = $3
            "#,
        )
        .bind(status.as_db_str())
        .bind(message)
        .bind(request_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_batch_status(&self, batch_id: &str, status: RequestStatus) -> Result<()> {
        sqlx::query(
            "UPDATE broadcast_requests SET status = $1, updated_at = now() WHERE batch_id = $2",
        )
        .bind(status.as_db_str())
        .bind(batch_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_latest_signed_tx(&self, request_id: &str) -> Result<String> {
        let row: (String,) =
            sqlx::query_as("SELECT signed_payload FROM broadcast_requests WHERE request_id = $1")
                .bind(request_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| NotFoundSnafu { request_id: request_id.to_string() }.build())?;
        Ok(row.0)
    }

    pub async fn save_sent_transaction(&self, record: &SentTransactionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sent_transactions
                (id, request_id, batch_id, tx_hash, broadcast_hash, sender_address,
                 chain_id, nonce, status, error_message, broadcasted_at, block_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tx_hash) DO UPDATE SET
                broadcast_hash = EXCLUDED.broadcast_hash,
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message,
                broadcasted_at = EXCLUDED.broadcasted_at,
                block_number = EXCLUDED.block_number
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.request_id)
        .bind(&record.batch_id)
        .bind(&record.tx_hash)
        .bind(&record.broadcast_hash)
        .bind(&record.sender_address)
        .bind(record.chain_id as i64)
        .bind(record.nonce as i64)
        .bind(match record.status {
            broadcast_models::BroadcastStatus::Broadcasted => "broadcasted",
            broadcast_models::BroadcastStatus::Failed => "failed",
        })
        .bind(&record.error_message)
        .bind(record.broadcasted_at)
        .bind(record.block_number.map(|n| n as i64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_as_confirmed(&self, tx_hash: &str, block_number: u64) -> Result<()> {
        sqlx::query(
            "UPDATE sent_transactions SET status = 'confirmed', block_number = $1 WHERE tx_hash = $2",
        )
        .bind(block_number as i64)
        .bind(tx_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_as_failed(&self, tx_hash: &str, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE sent_transactions SET status = 'failed', error_message = $1 WHERE tx_hash = $2",
        )
        .bind(error_message)
        .bind(tx_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_sent(&self, original_hash: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1::BIGINT FROM sent_transactions WHERE tx_hash = $1 LIMIT 1")
                .bind(original_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    pub async fn confirmed_at(&self, tx_hash: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT broadcasted_at FROM sent_transactions WHERE tx_hash = $1")
                .bind(tx_hash)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|r| r.0))
    }
}
