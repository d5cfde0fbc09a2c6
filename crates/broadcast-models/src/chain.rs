use serde::{Deserialize, Serialize};

/// Identifies the target network of a transaction. `chain_id` is always the
/// authoritative identifier once resolved; `chain`/`network` are the
/// human-readable names used by upstream producers and the static chain
/// table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainContext {
    pub chain: String,
    pub network: String,
    pub chain_id: u64,
}

/// The resolved output of the Chain Registry for one `(chain, network)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEntry {
    pub chain_id: u64,
    pub rpc_endpoint: String,
    pub native_symbol: String,
    pub explorer: Option<String>,
}
