use async_trait::async_trait;
use aws_sdk_sqs::Client;
use broadcast_models::BroadcastResultMessage;
use snafu::ResultExt;

use crate::error::{Result, SendSnafu};

/// Sink for broadcast outcomes, one message per batch (or per single
/// request) carrying `affectedRequests` in its metadata (spec §6).
#[async_trait]
pub trait ResultQueue: Send + Sync {
    async fn send_result(&self, message: &BroadcastResultMessage) -> Result<()>;
}

pub struct SqsResultQueue {
    client: Client,
    queue_url: String,
}

impl SqsResultQueue {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl ResultQueue for SqsResultQueue {
    async fn send_result(&self, message: &BroadcastResultMessage) -> Result<()> {
        let body = serde_json::to_string(message).expect("BroadcastResultMessage is serializable");
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .context(SendSnafu)?;
        Ok(())
    }
}
