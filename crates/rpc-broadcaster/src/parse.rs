use alloy::consensus::transaction::SignerRecoverable;
use alloy::consensus::Transaction;
use alloy::consensus::TxEnvelope;
use alloy::eips::Decodable2718;
use broadcast_models::BroadcastError;

#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    pub sender_address: String,
    pub nonce: u64,
    pub chain_id: u64,
    pub tx_hash: String,
}

/// Decodes a hex-encoded signed payload and recovers the fields the Worker
/// Loop and Nonce Manager need without ever submitting it. Shared by
/// `RpcBroadcaster::broadcast` and the Nonce Manager's upstream-gap search so
/// payload decoding happens in exactly one place.
pub fn parse_signed_payload(signed_payload: &str) -> Result<ParsedTransaction, BroadcastError> {
    let trimmed = signed_payload.strip_prefix("0x").unwrap_or(signed_payload);
    let raw = hex::decode(trimmed).map_err(|e| BroadcastError::Validation {
        message: format!("signed payload is not valid hex: {e}"),
    })?;
    let envelope = TxEnvelope::decode_2718(&mut raw.as_slice()).map_err(|e| BroadcastError::Validation {
        message: format!("could not decode signed payload: {e}"),
    })?;
    let sender_address = envelope
        .recover_signer()
        .map_err(|e| BroadcastError::Validation {
            message: format!("could not recover sender from signature: {e}"),
        })?;
    let chain_id = envelope.chain_id().ok_or_else(|| BroadcastError::Validation {
        message: "signed payload has no chain_id (not an EIP-155 transaction)".to_string(),
    })?;

    Ok(ParsedTransaction {
        sender_address: format!("{sender_address:#x}"),
        nonce: envelope.nonce(),
        chain_id,
        tx_hash: format!("{:#x}", envelope.tx_hash()),
    })
}
