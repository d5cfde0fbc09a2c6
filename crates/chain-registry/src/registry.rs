use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use broadcast_models::{ChainContext, ChainEntry};
use dashmap::DashMap;
use snafu::ResultExt;

use crate::error::{InvalidEndpointSnafu, Result, UnsupportedSnafu};
use crate::table::ChainTable;

/// Resolves `(chain, network)` pairs to a `ChainEntry` and lazily caches one
/// RPC client per `chain_id`, grounded on the registry/provider split this
/// codebase already uses for chain operations.
pub struct ChainRegistry {
    table: ChainTable,
    clients: DashMap<u64, DynProvider>,
}

impl ChainRegistry {
    pub fn new(table: ChainTable) -> Self {
        Self {
            table,
            clients: DashMap::new(),
        }
    }

    pub fn resolve(&self, chain: &str, network: &str) -> Result<ChainContext> {
        let entry = self.table.get(chain, network).ok_or_else(|| {
            UnsupportedSnafu {
                chain: chain.to_string(),
                network: network.to_string(),
            }
            .build()
        })?;
        Ok(ChainContext {
            chain: chain.to_string(),
            network: network.to_string(),
            chain_id: entry.chain_id,
        })
    }

    pub fn entry(&self, chain: &str, network: &str) -> Result<&ChainEntry> {
        self.table.get(chain, network).ok_or_else(|| {
            UnsupportedSnafu {
                chain: chain.to_string(),
                network: network.to_string(),
            }
            .build()
        })
    }

    pub fn is_supported(&self, chain: &str, network: &str) -> bool {
        self.table.get(chain, network).is_some()
    }

    /// `spec.md` §4.2 `isSupported(chainId)`.
    pub fn is_chain_id_supported(&self, chain_id: u64) -> bool {
        self.table.entries().any(|(_, _, e)| e.chain_id == chain_id)
    }

    /// Reverse lookup used by the health check to pick any one configured
    /// `(chain, network)` pair for a given `chain_id`.
    pub fn name_for_chain_id(&self, chain_id: u64) -> Option<(String, String)> {
        self.table
            .entries()
            .find(|(_, _, e)| e.chain_id == chain_id)
            .map(|(chain, network, _)| (chain.to_string(), network.to_string()))
    }

    /// Returns the cached provider for `chain_id`, building and inserting it
    /// on first use. One client per `chain_id`, never one per call.
    pub fn rpc_client(&self, chain: &str, network: &str) -> Result<DynProvider> {
        let entry = self.entry(chain, network)?;
        if let Some(existing) = self.clients.get(&entry.chain_id) {
            return Ok(existing.clone());
        }
        let url = entry.rpc_endpoint.parse().context(InvalidEndpointSnafu {
            chain_id: entry.chain_id,
            endpoint: entry.rpc_endpoint.clone(),
        })?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        self.clients.insert(entry.chain_id, provider.clone());
        Ok(provider)
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        self.table.entries().map(|(_, _, e)| e.chain_id).collect()
    }
}

// Re-exported so callers can reach basic provider operations (eth_blockNumber
// etc.) without importing `alloy::providers::Provider` themselves.
pub use alloy::providers::Provider as RpcProvider;
