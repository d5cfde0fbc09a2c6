//! Exercises the in-memory mock queues against the same trait contracts
//! `broadcaster-worker` drives in production, without any AWS dependency.

use broadcast_models::{
    BroadcastResultMessage, BroadcastStatus, DlqError, DlqMessage, DlqMeta, MessageKind,
    ResultMetadata, UpstreamMessage,
};
use chrono::Utc;
use queue_client::mock::{InMemoryDlqQueue, InMemoryResultQueue, InMemoryUpstreamQueue};
use queue_client::{DlqQueue, ResultQueue, UpstreamPayload, UpstreamQueue};

fn sample_message(request_id: &str) -> UpstreamMessage {
    UpstreamMessage {
        request_id: request_id.to_string(),
        kind: MessageKind::Single,
        batch_id: None,
        signed_payload: "0xdead".into(),
        chain: "ethereum".into(),
        network: "mainnet".into(),
        chain_id: Some(1),
        receipt_handle: None,
    }
}

#[tokio::test]
async fn upstream_messages_are_received_fifo_and_removed_on_delete() {
    let queue = InMemoryUpstreamQueue::new();
    queue.push(sample_message("req-1"));
    queue.push(sample_message("req-2"));
    assert_eq!(queue.len(), 2);

    let received = queue.receive(10, 0).await.unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(request_id_of(&received[0].body), "req-1");
    assert_eq!(request_id_of(&received[1].body), "req-2");
    assert!(queue.is_empty());

    // Already drained by receive(); deleting a stale handle is a no-op.
    queue.delete(&received[0].receipt_handle).await.unwrap();
    assert!(queue.is_empty());
}

fn request_id_of(payload: &UpstreamPayload) -> &str {
    match payload {
        UpstreamPayload::Decoded(msg) => &msg.request_id,
        UpstreamPayload::Malformed { .. } => panic!("expected a decoded message"),
    }
}

#[tokio::test]
async fn malformed_upstream_bodies_are_surfaced_not_dropped() {
    let queue = InMemoryUpstreamQueue::new();
    queue.push_malformed("not json", "expected value at line 1 column 1");

    let received = queue.receive(10, 0).await.unwrap();
    assert_eq!(received.len(), 1);
    match &received[0].body {
        UpstreamPayload::Malformed { raw_body, reason } => {
            assert_eq!(raw_body, "not json");
            assert!(!reason.is_empty());
        }
        UpstreamPayload::Decoded(_) => panic!("expected a malformed payload"),
    }
}

#[tokio::test]
async fn result_and_dlq_queues_capture_what_was_sent() {
    let results = InMemoryResultQueue::new();
    let dlq = InMemoryDlqQueue::new();

    let success = BroadcastResultMessage {
        id: "req-1_0".into(),
        kind: MessageKind::Single,
        request_id: Some("req-1".into()),
        batch_id: None,
        original_hash: "0xdead".into(),
        broadcast_hash: Some("0xabc".into()),
        status: BroadcastStatus::Broadcasted,
        error: None,
        broadcasted_at: Some(Utc::now()),
        block_number: None,
        chain: "ethereum".into(),
        network: "mainnet".into(),
        metadata: ResultMetadata::default(),
    };
    results.send_result(&success).await.unwrap();
    assert_eq!(results.drain().len(), 1);
    assert!(results.drain().is_empty());

    let dlq_msg = DlqMessage {
        original: sample_message("req-2"),
        error: DlqError {
            error_type: "Validation".into(),
            code: "MalformedMessage".into(),
            message: "malformed message".into(),
            details: None,
        },
        meta: DlqMeta {
            timestamp: Utc::now(),
            attempt_count: 0,
        },
    };
    dlq.send_to_dlq(&dlq_msg).await.unwrap();
    assert_eq!(dlq.drain().len(), 1);
}
