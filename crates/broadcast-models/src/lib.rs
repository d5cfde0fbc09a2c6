pub mod chain;
pub mod error;
pub mod tx;

pub use chain::{ChainContext, ChainEntry};
pub use error::{BroadcastError, ErrorClass};
pub use tx::{
    BroadcastResultMessage, BroadcastStatus, DlqError, DlqMessage, DlqMeta, MessageKind,
    NonceGapInfo, QueuedTransaction, RequestStatus, ResultMetadata, SentTransactionRecord,
    UpstreamMessage,
};
