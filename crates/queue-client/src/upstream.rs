use async_trait::async_trait;
use aws_sdk_sqs::Client;
use snafu::{OptionExt, ResultExt};
use tracing::{debug, warn};

use crate::error::{DeleteSnafu, EmptyBodySnafu, ReceiveSnafu, Result};
use crate::message::{ReceivedMessage, UpstreamPayload};

/// Source of normalized inbound broadcast requests. The Worker Loop long-polls
/// this for new work and deletes messages only after they've been durably
/// handed to the Nonce Manager (spec §4.6). A body that fails to decode is
/// still returned (as `UpstreamPayload::Malformed`, receipt handle attached)
/// rather than dropped, so the caller can route it to the DLQ and delete it.
#[async_trait]
pub trait UpstreamQueue: Send + Sync {
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
    ) -> Result<Vec<ReceivedMessage<UpstreamPayload>>>;

    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

pub struct SqsUpstreamQueue {
    client: Client,
    queue_url: String,
}

impl SqsUpstreamQueue {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl UpstreamQueue for SqsUpstreamQueue {
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_seconds: i32,
    ) -> Result<Vec<ReceivedMessage<UpstreamPayload>>> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_seconds)
            .send()
            .await
            .context(ReceiveSnafu)?;

        let mut out = Vec::new();
        for msg in resp.messages.unwrap_or_default() {
            let receipt_handle = match msg.receipt_handle {
                Some(h) => h,
                None => {
                    // No handle means no way to delete or DLQ this message;
                    // there is nothing a caller could do with it either.
                    warn!("sqs message missing receipt handle, skipping");
                    continue;
                }
            };
            let body = msg.body.context(EmptyBodySnafu)?;
            let payload = match serde_json::from_str::<broadcast_models::UpstreamMessage>(&body) {
                Ok(m) => {
                    debug!(request_id = %m.request_id, "received upstream message");
                    UpstreamPayload::Decoded(m)
                }
                Err(err) => {
                    warn!(%err, "upstream message failed to decode, surfacing as malformed");
                    UpstreamPayload::Malformed { raw_body: body, reason: err.to_string() }
                }
            };
            out.push(ReceivedMessage { body: payload, receipt_handle });
        }
        Ok(out)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .context(DeleteSnafu)?;
        Ok(())
    }
}
