mod dlq;
mod downstream;
mod error;
mod message;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod upstream;

pub use dlq::{DlqQueue, SqsDlqQueue};
pub use downstream::{ResultQueue, SqsResultQueue};
pub use error::{QueueError, Result};
pub use message::{ReceivedMessage, UpstreamPayload};
pub use upstream::{SqsUpstreamQueue, UpstreamQueue};
