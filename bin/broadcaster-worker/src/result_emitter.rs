use broadcast_models::{
    BroadcastResultMessage, BroadcastStatus, DlqError, DlqMessage, DlqMeta, MessageKind,
    NonceGapInfo, QueuedTransaction, RequestStatus, ResultMetadata, SentTransactionRecord,
    UpstreamMessage,
};
use chrono::Utc;

/// Composes the two downstream wire shapes from `spec.md` §6 and the
/// relational row the Worker Loop persists on every terminal outcome. Has no
/// branching logic of its own beyond this mapping (spec §2 budget: 2%).
pub fn success_result(
    tx: &QueuedTransaction,
    broadcast_hash: &str,
    block_number: Option<u64>,
) -> BroadcastResultMessage {
    BroadcastResultMessage {
        id: tx.tx_key(),
        kind: tx.kind,
        request_id: (tx.kind == MessageKind::Single).then(|| tx.request_id.clone()),
        batch_id: tx.batch_id.clone(),
        original_hash: tx.tx_hash.clone(),
        broadcast_hash: Some(broadcast_hash.to_string()),
        status: BroadcastStatus::Broadcasted,
        error: None,
        broadcasted_at: Some(Utc::now()),
        block_number,
        chain: tx.chain_context.chain.clone(),
        network: tx.chain_context.network.clone(),
        metadata: ResultMetadata::default(),
    }
}

pub fn failure_result(tx: &QueuedTransaction, error: &str) -> BroadcastResultMessage {
    BroadcastResultMessage {
        id: tx.tx_key(),
        kind: tx.kind,
        request_id: (tx.kind == MessageKind::Single).then(|| tx.request_id.clone()),
        batch_id: tx.batch_id.clone(),
        original_hash: tx.tx_hash.clone(),
        broadcast_hash: None,
        status: BroadcastStatus::Failed,
        error: Some(error.to_string()),
        broadcasted_at: None,
        block_number: None,
        chain: tx.chain_context.chain.clone(),
        network: tx.chain_context.network.clone(),
        metadata: ResultMetadata::default(),
    }
}

pub fn nonce_gap_info(expected: u64, actual: u64) -> NonceGapInfo {
    let gap = actual.saturating_sub(expected);
    NonceGapInfo {
        has_gap: true,
        expected,
        actual,
        gap,
        missing: (expected..actual).collect(),
    }
}

pub fn dlq_message(
    original: UpstreamMessage,
    error_type: &str,
    code: &str,
    message: &str,
    details: Option<NonceGapInfo>,
    attempt_count: u32,
) -> DlqMessage {
    DlqMessage {
        original,
        error: DlqError {
            error_type: error_type.to_string(),
            code: code.to_string(),
            message: message.to_string(),
            details,
        },
        meta: DlqMeta {
            timestamp: Utc::now(),
            attempt_count,
        },
    }
}

/// Wraps a body that never decoded into the canonical upstream shape so it
/// can still travel through `DlqMessage.original`. `request_id` and the chain
/// fields aren't recoverable from an undecodable body, so they're filled with
/// sentinels and the raw text is kept verbatim in `signed_payload` for an
/// operator to inspect.
pub fn upstream_message_from_malformed(raw_body: &str) -> UpstreamMessage {
    UpstreamMessage {
        request_id: "unknown".to_string(),
        kind: MessageKind::Single,
        batch_id: None,
        signed_payload: raw_body.to_string(),
        chain: "unknown".to_string(),
        network: "unknown".to_string(),
        chain_id: None,
        receipt_handle: None,
    }
}

/// Reconstructs the canonical upstream shape from a `QueuedTransaction` for
/// DLQ wrapping when the original raw message is no longer at hand (it was
/// already deleted from the upstream queue once durably inserted — spec §5
/// treats the pending list, not the queue, as the durability boundary).
pub fn upstream_message_from_queued(tx: &QueuedTransaction) -> UpstreamMessage {
    UpstreamMessage {
        request_id: tx.request_id.clone(),
        kind: tx.kind,
        batch_id: tx.batch_id.clone(),
        signed_payload: tx.signed_payload.clone(),
        chain: tx.chain_context.chain.clone(),
        network: tx.chain_context.network.clone(),
        chain_id: Some(tx.chain_context.chain_id),
        receipt_handle: None,
    }
}

pub fn sent_record(
    tx: &QueuedTransaction,
    status: BroadcastStatus,
    broadcast_hash: Option<String>,
    error_message: Option<String>,
    block_number: Option<u64>,
) -> SentTransactionRecord {
    SentTransactionRecord {
        request_id: tx.request_id.clone(),
        batch_id: tx.batch_id.clone(),
        tx_hash: tx.tx_hash.clone(),
        broadcast_hash,
        sender_address: tx.sender_address.clone(),
        chain_id: tx.chain_context.chain_id,
        nonce: tx.nonce,
        status,
        error_message,
        broadcasted_at: matches!(status, BroadcastStatus::Broadcasted).then(Utc::now),
        block_number,
    }
}

pub fn request_status_for(status: BroadcastStatus) -> RequestStatus {
    match status {
        BroadcastStatus::Broadcasted => RequestStatus::Broadcasted,
        BroadcastStatus::Failed => RequestStatus::Failed,
    }
}
