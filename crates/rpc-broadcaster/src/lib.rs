mod broadcaster;
mod classify;
mod parse;

pub use broadcaster::{BroadcastOutcome, NetworkStatus, RpcBroadcaster};
pub use classify::classify_send_error;
pub use parse::{parse_signed_payload, ParsedTransaction};
