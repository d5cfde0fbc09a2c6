use std::time::Duration;

use alloy::providers::{DynProvider, Provider};
use broadcast_models::BroadcastError;
use tokio::time::Instant;

use crate::classify::classify_send_error;
use crate::parse::parse_signed_payload;

#[derive(Debug, Clone)]
pub struct BroadcastOutcome {
    pub tx_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStatus {
    pub block_number: u64,
    pub gas_price: u128,
}

/// Single-operation wrapper around an Alloy provider: parse, submit,
/// classify. Never resolves `(chain, network)` itself — that's the Chain
/// Registry's job; this type is handed an already-resolved provider and
/// `chain_id`.
pub struct RpcBroadcaster {
    provider: DynProvider,
    chain_id: u64,
}

impl RpcBroadcaster {
    pub fn new(provider: DynProvider, chain_id: u64) -> Self {
        Self { provider, chain_id }
    }

    pub async fn broadcast(&self, signed_payload: &str) -> Result<BroadcastOutcome, BroadcastError> {
        let parsed = parse_signed_payload(signed_payload)?;
        if parsed.chain_id != self.chain_id {
            return Err(BroadcastError::Validation {
                message: format!(
                    "payload chain_id {} does not match expected chain_id {}",
                    parsed.chain_id, self.chain_id
                ),
            });
        }

        let raw = decode_hex_payload(signed_payload)?;
        match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => Ok(BroadcastOutcome {
                tx_hash: format!("{:#x}", pending.tx_hash()),
            }),
            Err(err) => Err(classify_send_error(&err)),
        }
    }

    pub async fn wait_for_confirmation(
        &self,
        tx_hash: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Option<u64>, BroadcastError> {
        let hash: alloy::primitives::B256 = tx_hash.parse().map_err(|_| BroadcastError::Validation {
            message: format!("invalid tx hash {tx_hash}"),
        })?;
        let deadline = Instant::now() + timeout;
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(|e| BroadcastError::Network {
                    message: e.to_string(),
                })?;
            if let Some(receipt) = receipt {
                return Ok(receipt.block_number);
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    pub async fn network_status(&self) -> Result<NetworkStatus, BroadcastError> {
        let block_number = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| BroadcastError::Network {
                message: e.to_string(),
            })?;
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| BroadcastError::Network {
                message: e.to_string(),
            })?;
        Ok(NetworkStatus {
            block_number,
            gas_price,
        })
    }
}

fn decode_hex_payload(signed_payload: &str) -> Result<Vec<u8>, BroadcastError> {
    let trimmed = signed_payload.strip_prefix("0x").unwrap_or(signed_payload);
    hex::decode(trimmed).map_err(|e| BroadcastError::Validation {
        message: format!("signed payload is not valid hex: {e}"),
    })
}
