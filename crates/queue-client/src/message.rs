/// A message pulled off an SQS-backed queue, paired with the receipt handle
/// needed to delete it once processing completes.
#[derive(Debug, Clone)]
pub struct ReceivedMessage<T> {
    pub body: T,
    pub receipt_handle: String,
}

/// Outcome of decoding one upstream-queue body. Kept paired with its receipt
/// handle through `ReceivedMessage` so a `Malformed` message can still be
/// routed to the DLQ and deleted instead of silently redelivered forever
/// (spec §4.6 step 2a, §7 "no silent drops").
#[derive(Debug, Clone)]
pub enum UpstreamPayload {
    Decoded(broadcast_models::UpstreamMessage),
    Malformed { raw_body: String, reason: String },
}
