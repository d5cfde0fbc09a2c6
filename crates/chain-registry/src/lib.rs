mod error;
mod registry;
mod table;

pub use error::{RegistryError, Result};
pub use registry::{ChainRegistry, RpcProvider};
pub use table::ChainTable;

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        [ethereum.mainnet]
        chain_id = 1
        rpc_endpoint = "https://eth-mainnet.example.com"
        native_symbol = "ETH"
        explorer = "https://etherscan.io"

        [ethereum.sepolia]
        chain_id = 11155111
        rpc_endpoint = "https://eth-sepolia.example.com"
        native_symbol = "ETH"
    "#;

    #[test]
    fn resolves_known_chain_network_pair() {
        let table = ChainTable::load_from_str(TABLE).unwrap();
        let registry = ChainRegistry::new(table);
        let ctx = registry.resolve("ethereum", "mainnet").unwrap();
        assert_eq!(ctx.chain_id, 1);
    }

    #[test]
    fn unsupported_pair_is_rejected() {
        let table = ChainTable::load_from_str(TABLE).unwrap();
        let registry = ChainRegistry::new(table);
        assert!(registry.resolve("ethereum", "devnet").is_err());
        assert!(!registry.is_supported("ethereum", "devnet"));
    }

    #[test]
    fn duplicate_chain_ids_are_rejected_at_load() {
        let table = r#"
            [ethereum.mainnet]
            chain_id = 1
            rpc_endpoint = "https://a.example.com"
            native_symbol = "ETH"

            [polygon.mainnet]
            chain_id = 1
            rpc_endpoint = "https://b.example.com"
            native_symbol = "MATIC"
        "#;
        assert!(ChainTable::load_from_str(table).is_err());
    }

    #[test]
    fn rpc_client_is_cached_per_chain_id() {
        let table = ChainTable::load_from_str(TABLE).unwrap();
        let registry = ChainRegistry::new(table);
        let a = registry.rpc_client("ethereum", "mainnet").unwrap();
        let b = registry.rpc_client("ethereum", "mainnet").unwrap();
        assert_eq!(registry.chain_ids().len(), 2);
        drop(a);
        drop(b);
    }
}
