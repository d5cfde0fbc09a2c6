use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::ChainContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Single,
    Batch,
}

/// One pending submission. `signed_payload` is the authoritative source of
/// `tx_hash`, `sender_address`, and `nonce` — those fields are cached here
/// for indexing, never re-derived independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedTransaction {
    pub signed_payload: String,
    pub tx_hash: String,
    pub nonce: u64,
    pub sender_address: String,
    pub chain_context: ChainContext,
    pub request_id: String,
    pub kind: MessageKind,
    pub batch_id: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub priority: i64,
}

impl QueuedTransaction {
    /// Key used for coordination-store idempotency markers: `requestId_nonce`
    /// unless a `txHash` is already known, per `IdempotencyMarkers` (spec §3).
    pub fn tx_key(&self) -> String {
        format!("{}_{}", self.request_id, self.nonce)
    }
}

/// Normalized form of an inbound upstream-queue message, produced by the
/// Worker Loop's normalization step. Anything that doesn't map cleanly onto
/// this shape is rejected with `MalformedMessage` before it reaches the
/// Nonce Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub request_id: String,
    pub kind: MessageKind,
    pub batch_id: Option<String>,
    pub signed_payload: String,
    pub chain: String,
    pub network: String,
    pub chain_id: Option<u64>,
    /// Handle used to delete/extend visibility on the upstream queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_handle: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    Broadcasted,
    Failed,
}

/// Lifecycle of an upstream request as tracked in the relational State Store
/// (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Signed,
    Broadcasting,
    Broadcasted,
    Confirmed,
    Failed,
}

impl RequestStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RequestStatus::Signed => "SIGNED",
            RequestStatus::Broadcasting => "BROADCASTING",
            RequestStatus::Broadcasted => "BROADCASTED",
            RequestStatus::Confirmed => "CONFIRMED",
            RequestStatus::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        Some(match s {
            "SIGNED" => RequestStatus::Signed,
            "BROADCASTING" => RequestStatus::Broadcasting,
            "BROADCASTED" => RequestStatus::Broadcasted,
            "CONFIRMED" => RequestStatus::Confirmed,
            "FAILED" => RequestStatus::Failed,
            _ => return None,
        })
    }
}

/// Message emitted to the downstream broadcast-result queue (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResultMessage {
    pub id: String,
    pub kind: MessageKind,
    pub request_id: Option<String>,
    pub batch_id: Option<String>,
    pub original_hash: String,
    pub broadcast_hash: Option<String>,
    pub status: BroadcastStatus,
    pub error: Option<String>,
    pub broadcasted_at: Option<DateTime<Utc>>,
    pub block_number: Option<u64>,
    pub chain: String,
    pub network: String,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_requests: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_to_dlq: Option<bool>,
}

/// Message wrapping the original upstream payload on the way to the DLQ
/// (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    pub original: UpstreamMessage,
    pub error: DlqError,
    pub meta: DlqMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<NonceGapInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMeta {
    pub timestamp: DateTime<Utc>,
    pub attempt_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceGapInfo {
    pub has_gap: bool,
    pub expected: u64,
    pub actual: u64,
    pub gap: u64,
    pub missing: Vec<u64>,
}

/// A row persisted by the Result Emitter into the relational State Store on
/// every terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentTransactionRecord {
    pub request_id: String,
    pub batch_id: Option<String>,
    pub tx_hash: String,
    pub broadcast_hash: Option<String>,
    pub sender_address: String,
    pub chain_id: u64,
    pub nonce: u64,
    pub status: BroadcastStatus,
    pub error_message: Option<String>,
    pub broadcasted_at: Option<DateTime<Utc>>,
    pub block_number: Option<u64>,
}
