use std::collections::HashMap;

use broadcast_models::ChainEntry;
use tracing::info;

use crate::error::{ConfigInvalidSnafu, Result};

/// `chain -> network -> ChainEntry`, as loaded from the static TOML chain
/// table. Never auto-detects `chain_id`; every entry is asserted, not
/// inferred.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ChainTable(HashMap<String, HashMap<String, ChainEntry>>);

impl ChainTable {
    pub fn load_from_str(raw: &str) -> Result<Self> {
        let mut table: ChainTable =
            toml::from_str(raw).map_err(|e| crate::error::RegistryError::ConfigInvalid {
                message: e.to_string(),
            })?;
        table.validate_unique_chain_ids()?;
        table.apply_env_overrides();
        Ok(table)
    }

    fn validate_unique_chain_ids(&self) -> Result<()> {
        let mut seen: HashMap<u64, (String, String)> = HashMap::new();
        for (chain, networks) in &self.0 {
            for (network, entry) in networks {
                if let Some((prev_chain, prev_network)) =
                    seen.insert(entry.chain_id, (chain.clone(), network.clone()))
                {
                    return ConfigInvalidSnafu {
                        message: format!(
                            "chain_id {} is used by both {prev_chain}/{prev_network} and {chain}/{network}",
                            entry.chain_id
                        ),
                    }
                    .fail();
                }
            }
        }
        Ok(())
    }

    /// Applies `RPC_URL`/`CHAIN_ID` overrides to the single entry named by
    /// `CHAIN_OVERRIDE_TARGET` (`chain/network`), or to the table's sole
    /// entry if the table has exactly one and the target var is unset.
    fn apply_env_overrides(&mut self) {
        let target = std::env::var("CHAIN_OVERRIDE_TARGET").ok().or_else(|| {
            let mut all = self.0.iter().flat_map(|(chain, networks)| {
                networks.keys().map(move |network| format!("{chain}/{network}"))
            });
            match (all.next(), all.next()) {
                (Some(only), None) => Some(only),
                _ => None,
            }
        });
        let Some(target) = target else { return };
        let Some((chain, network)) = target.split_once('/') else {
            return;
        };
        let Some(entry) = self.0.get_mut(chain).and_then(|networks| networks.get_mut(network)) else {
            return;
        };

        if let Ok(rpc_url) = std::env::var("RPC_URL") {
            info!(chain, network, rpc_url, "overriding rpc_endpoint from environment");
            entry.rpc_endpoint = rpc_url;
        }
        if let Ok(chain_id) = std::env::var("CHAIN_ID") {
            if let Ok(chain_id) = chain_id.parse() {
                info!(chain, network, chain_id, "overriding chain_id from environment");
                entry.chain_id = chain_id;
            }
        }
    }

    pub fn get(&self, chain: &str, network: &str) -> Option<&ChainEntry> {
        self.0.get(chain)?.get(network)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &ChainEntry)> {
        self.0.iter().flat_map(|(chain, networks)| {
            networks
                .iter()
                .map(move |(network, entry)| (chain.as_str(), network.as_str(), entry))
        })
    }
}
