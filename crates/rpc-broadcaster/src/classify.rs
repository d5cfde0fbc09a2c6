use alloy::transports::{RpcError, TransportErrorKind};
use broadcast_models::BroadcastError;

/// The one place in this codebase allowed to match on RPC error text
/// (spec §9 "Error surfacing"). Everything downstream of this function
/// only ever sees the closed [`BroadcastError`] taxonomy.
pub fn classify_send_error(err: &RpcError<TransportErrorKind>) -> BroadcastError {
    match err {
        RpcError::Transport(_) | RpcError::NullResp => BroadcastError::Network {
            message: err.to_string(),
        },
        RpcError::ErrorResp(payload) => classify_provider_message(&payload.message),
        other => BroadcastError::Unknown {
            message: other.to_string(),
        },
    }
}

fn classify_provider_message(message: &str) -> BroadcastError {
    let lower = message.to_lowercase();

    if lower.contains("nonce too low")
        || lower.contains("already known")
        || lower.contains("replacement transaction underpriced")
    {
        return BroadcastError::NonceTooLow {
            message: message.to_string(),
        };
    }
    if lower.contains("nonce too high") {
        return parse_nonce_too_high(&lower);
    }
    if lower.contains("insufficient funds") {
        return BroadcastError::InsufficientFunds {
            message: message.to_string(),
        };
    }
    if lower.contains("intrinsic gas too low") || lower.contains("invalid sender") {
        return BroadcastError::Validation {
            message: message.to_string(),
        };
    }

    BroadcastError::Provider {
        message: message.to_string(),
    }
}

/// Parses expected/actual nonce values out of go-ethereum-style rejection
/// text (e.g. `"nonce too high: next nonce 8, tx nonce 10"`) instead of
/// discarding them. Falls back to `0` for whichever side isn't present in a
/// given client's message format.
fn parse_nonce_too_high(lower_message: &str) -> BroadcastError {
    const EXPECTED_LABELS: [&str; 4] =
        ["next nonce", "expected nonce", "account nonce", "current nonce"];
    const ACTUAL_LABELS: [&str; 3] = ["tx nonce", "given nonce", "provided nonce"];

    BroadcastError::NonceTooHigh {
        expected: find_number_after_any(lower_message, &EXPECTED_LABELS).unwrap_or(0),
        actual: find_number_after_any(lower_message, &ACTUAL_LABELS).unwrap_or(0),
    }
}

fn find_number_after_any(haystack: &str, labels: &[&str]) -> Option<u64> {
    for label in labels {
        let Some(idx) = haystack.find(label) else { continue };
        let rest = &haystack[idx + label.len()..];
        let digits: String =
            rest.chars().skip_while(|c| !c.is_ascii_digit()).take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse() {
            return Some(n);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_too_low_variants_are_recognized() {
        for msg in ["nonce too low", "already known", "replacement transaction underpriced"] {
            assert!(matches!(
                classify_provider_message(msg),
                BroadcastError::NonceTooLow { .. }
            ));
        }
    }

    #[test]
    fn nonce_too_high_extracts_expected_and_actual_from_message() {
        let err =
            classify_provider_message("nonce too high: next nonce 8, tx nonce 10");
        assert!(matches!(
            err,
            BroadcastError::NonceTooHigh { expected: 8, actual: 10 }
        ));
    }

    #[test]
    fn nonce_too_high_falls_back_to_zero_when_message_has_no_numbers() {
        let err = classify_provider_message("nonce too high");
        assert!(matches!(
            err,
            BroadcastError::NonceTooHigh { expected: 0, actual: 0 }
        ));
    }

    #[test]
    fn insufficient_funds_is_recognized() {
        assert!(matches!(
            classify_provider_message("insufficient funds for gas * price + value"),
            BroadcastError::InsufficientFunds { .. }
        ));
    }

    #[test]
    fn intrinsic_gas_too_low_is_validation() {
        assert!(matches!(
            classify_provider_message("intrinsic gas too low"),
            BroadcastError::Validation { .. }
        ));
    }

    #[test]
    fn unrecognized_message_falls_back_to_provider() {
        assert!(matches!(
            classify_provider_message("execution reverted"),
            BroadcastError::Provider { .. }
        ));
    }
}
