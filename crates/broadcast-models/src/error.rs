use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// The closed error taxonomy from which every broadcast outcome is drawn.
/// Classification (string-matching on RPC error text) happens exactly once,
/// at the `rpc-broadcaster` boundary — nothing downstream re-inspects error
/// strings.
#[derive(Debug, Clone, Snafu)]
pub enum BroadcastError {
    #[snafu(display("network error: {message}"))]
    Network { message: String },

    #[snafu(display("provider error: {message}"))]
    Provider { message: String },

    #[snafu(display("nonce too high: expected {expected}, got {actual}"))]
    NonceTooHigh { expected: u64, actual: u64 },

    #[snafu(display("nonce too low: {message}"))]
    NonceTooLow { message: String },

    #[snafu(display("insufficient funds: {message}"))]
    InsufficientFunds { message: String },

    #[snafu(display("validation failed: {message}"))]
    Validation { message: String },

    #[snafu(display("unsupported chain: {chain_id}"))]
    Unsupported { chain_id: u64 },

    #[snafu(display("coordination store unavailable: {message}"))]
    StoreUnavailable { message: String },

    #[snafu(display("unknown error: {message}"))]
    Unknown { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    Network,
    Provider,
    NonceTooHigh,
    NonceTooLow,
    InsufficientFunds,
    Validation,
    Unsupported,
    StoreUnavailable,
    Unknown,
}

impl BroadcastError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BroadcastError::Network { .. } => ErrorClass::Network,
            BroadcastError::Provider { .. } => ErrorClass::Provider,
            BroadcastError::NonceTooHigh { .. } => ErrorClass::NonceTooHigh,
            BroadcastError::NonceTooLow { .. } => ErrorClass::NonceTooLow,
            BroadcastError::InsufficientFunds { .. } => ErrorClass::InsufficientFunds,
            BroadcastError::Validation { .. } => ErrorClass::Validation,
            BroadcastError::Unsupported { .. } => ErrorClass::Unsupported,
            BroadcastError::StoreUnavailable { .. } => ErrorClass::StoreUnavailable,
            BroadcastError::Unknown { .. } => ErrorClass::Unknown,
        }
    }

    /// Whether the class is retryable in place, independent of attempt
    /// count (spec §7 table). `NonceTooHigh` is "retryable" only in the
    /// sense that the engine itself resolves it via the reorder buffer, not
    /// via the Retry Policy.
    pub fn is_retryable_class(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Network | ErrorClass::Provider | ErrorClass::StoreUnavailable
        )
    }

    pub fn is_permanent_class(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::NonceTooLow
                | ErrorClass::InsufficientFunds
                | ErrorClass::Validation
                | ErrorClass::Unsupported
                | ErrorClass::Unknown
        )
    }
}
