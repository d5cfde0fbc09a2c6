use std::sync::Mutex;

use async_trait::async_trait;
use broadcast_models::{BroadcastResultMessage, DlqMessage, UpstreamMessage};

use crate::dlq::DlqQueue;
use crate::downstream::ResultQueue;
use crate::message::{ReceivedMessage, UpstreamPayload};
use crate::upstream::UpstreamQueue;
use crate::Result;

/// Single-process stand-in for the SQS-backed queues, used by
/// `integration-tests` to exercise the Worker Loop without AWS. Messages are
/// handed out in FIFO order and "deleted" by receipt handle, same contract as
/// the real queue from the caller's point of view.
#[derive(Default)]
pub struct InMemoryUpstreamQueue {
    inbox: Mutex<Vec<ReceivedMessage<UpstreamPayload>>>,
    next_handle: Mutex<u64>,
}

impl InMemoryUpstreamQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, message: UpstreamMessage) {
        self.push_payload(UpstreamPayload::Decoded(message));
    }

    /// Queues a body that failed to decode, the way `SqsUpstreamQueue` would
    /// surface one, for tests exercising the malformed-message path.
    pub fn push_malformed(&self, raw_body: impl Into<String>, reason: impl Into<String>) {
        self.push_payload(UpstreamPayload::Malformed {
            raw_body: raw_body.into(),
            reason: reason.into(),
        });
    }

    fn push_payload(&self, payload: UpstreamPayload) {
        let mut next_handle = self.next_handle.lock().unwrap();
        let receipt_handle = format!("handle-{}", *next_handle);
        *next_handle += 1;
        self.inbox.lock().unwrap().push(ReceivedMessage {
            body: payload,
            receipt_handle,
        });
    }

    pub fn len(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UpstreamQueue for InMemoryUpstreamQueue {
    async fn receive(
        &self,
        max_messages: i32,
        _wait_time_seconds: i32,
    ) -> Result<Vec<ReceivedMessage<UpstreamPayload>>> {
        let mut inbox = self.inbox.lock().unwrap();
        let take = (max_messages.max(0) as usize).min(inbox.len());
        Ok(inbox.drain(0..take).collect())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.inbox.lock().unwrap().retain(|m| m.receipt_handle != receipt_handle);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryResultQueue {
    sent: Mutex<Vec<BroadcastResultMessage>>,
}

impl InMemoryResultQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<BroadcastResultMessage> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

#[async_trait]
impl ResultQueue for InMemoryResultQueue {
    async fn send_result(&self, message: &BroadcastResultMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryDlqQueue {
    sent: Mutex<Vec<DlqMessage>>,
}

impl InMemoryDlqQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<DlqMessage> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

#[async_trait]
impl DlqQueue for InMemoryDlqQueue {
    async fn send_to_dlq(&self, message: &DlqMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}
