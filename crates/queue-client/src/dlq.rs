use async_trait::async_trait;
use aws_sdk_sqs::Client;
use broadcast_models::DlqMessage;
use snafu::ResultExt;

use crate::error::{Result, SendSnafu};

/// Sink for messages that exhausted retries or were permanently rejected
/// (spec §6), wrapping the original upstream payload plus failure detail.
#[async_trait]
pub trait DlqQueue: Send + Sync {
    async fn send_to_dlq(&self, message: &DlqMessage) -> Result<()>;
}

pub struct SqsDlqQueue {
    client: Client,
    queue_url: String,
}

impl SqsDlqQueue {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl DlqQueue for SqsDlqQueue {
    async fn send_to_dlq(&self, message: &DlqMessage) -> Result<()> {
        let body = serde_json::to_string(message).expect("DlqMessage is serializable");
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
