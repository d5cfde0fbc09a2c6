mod error;
mod repo;

pub use error::{Result, StateStoreError};
pub use repo::StateStore;

#[cfg(test)]
mod tests {
    use super::*;
    use broadcast_models::{BroadcastStatus, RequestStatus, SentTransactionRecord};
    use chrono::Utc;

    #[sqlx::test(migrations = "./migrations")]
    async fn request_lifecycle_round_trips(pool: sqlx::PgPool) {
        let store = StateStore::from_pool(pool).await.unwrap();
        store
            .create_request("req-1", None, "0xdead", "ethereum", "mainnet")
            .await
            .unwrap();
        assert_eq!(store.get_latest_signed_tx("req-1").await.unwrap(), "0xdead");

        store.update_status("req-1", RequestStatus::Broadcasting).await.unwrap();
        store
            .update_status_with_error("req-1", RequestStatus::Failed, "insufficient funds")
            .await
            .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn sent_transaction_upsert_and_confirmation(pool: sqlx::PgPool) {
        let store = StateStore::from_pool(pool).await.unwrap();
        let record = SentTransactionRecord {
            request_id: "req-2".into(),
            batch_id: None,
            tx_hash: "0xabc".into(),
            broadcast_hash: Some("0xabc".into()),
            sender_address: "0xsender".into(),
            chain_id: 1,
            nonce: 4,
            status: BroadcastStatus::Broadcasted,
            error_message: None,
            broadcasted_at: Some(Utc::now()),
            block_number: None,
        };
        store.save_sent_transaction(&record).await.unwrap();
        assert!(store.is_sent("0xabc").await.unwrap());

        store.mark_as_confirmed("0xabc", 100).await.unwrap();
        assert!(!store.is_sent("0xnonexistent").await.unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn batch_status_updates_all_members(pool: sqlx::PgPool) {
        let store = StateStore::from_pool(pool).await.unwrap();
        store
            .create_request("req-3", Some("batch-1"), "0x01", "ethereum", "mainnet")
            .await
            .unwrap();
        store
            .create_request("req-4", Some("batch-1"), "0x02", "ethereum", "mainnet")
            .await
            .unwrap();
        store.update_batch_status("batch-1", RequestStatus::Broadcasted).await.unwrap();
    }
}
