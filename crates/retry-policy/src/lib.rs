//! Pure decision logic for in-place retry vs. permanent failure vs. nonce
//! conflict. No I/O, no `async` — every function here is a total function of
//! its inputs so it can be exhaustively unit tested.

use broadcast_models::{BroadcastError, ErrorClass};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonceConflictKind {
    TooLow,
    TooHigh,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonceConflict {
    pub kind: NonceConflictKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay_seconds: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    pub max_delay_seconds: f64,
    pub multiplier: f64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_seconds: 2.0,
            max_delay_seconds: 60.0,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryPolicyConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryPolicyConfig) -> Self {
        Self { config }
    }

    /// `spec.md` §4.4 `shouldRetry`.
    pub fn should_retry(&self, error: &BroadcastError, attempt: u32) -> RetryDecision {
        if attempt >= self.config.max_retries {
            return RetryDecision {
                retry: false,
                delay_seconds: 0.0,
                reason: "exhausted".to_string(),
            };
        }
        if error.is_permanent_class() {
            return RetryDecision {
                retry: false,
                delay_seconds: 0.0,
                reason: "permanent".to_string(),
            };
        }
        // NonceTooHigh is engine-handled via the reorder buffer, never via
        // in-place retry.
        if error.class() == ErrorClass::NonceTooHigh {
            return RetryDecision {
                retry: false,
                delay_seconds: 0.0,
                reason: "nonce_gap".to_string(),
            };
        }

        let raw_delay = self.config.base_delay_seconds * self.config.multiplier.powi(attempt as i32);
        let capped = raw_delay.min(self.config.max_delay_seconds);
        let jittered = jitter(capped, &mut rand::thread_rng());

        RetryDecision {
            retry: true,
            delay_seconds: jittered.max(0.0),
            reason: "transient".to_string(),
        }
    }

    /// `spec.md` §4.4 `detectNonceConflict`. Errors are expected to already
    /// be classified by `rpc-broadcaster`; this re-derives the conflict
    /// kind/detail for the engine and the DLQ payload.
    pub fn detect_nonce_conflict(&self, error: &BroadcastError) -> Option<NonceConflict> {
        match error {
            BroadcastError::NonceTooHigh { expected, actual } => Some(NonceConflict {
                kind: NonceConflictKind::TooHigh,
                detail: format!("expected {expected}, got {actual}"),
            }),
            BroadcastError::NonceTooLow { message } => {
                let kind = if message.to_lowercase().contains("pending") {
                    NonceConflictKind::Pending
                } else {
                    NonceConflictKind::TooLow
                };
                Some(NonceConflict {
                    kind,
                    detail: message.clone(),
                })
            }
            _ => None,
        }
    }
}

fn jitter(delay: f64, rng: &mut impl Rng) -> f64 {
    let factor = rng.gen_range(0.75..=1.25);
    delay * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(RetryPolicyConfig::default())
    }

    #[test]
    fn exhausted_after_max_retries() {
        let decision = policy().should_retry(
            &BroadcastError::Network {
                message: "timeout".into(),
            },
            5,
        );
        assert!(!decision.retry);
        assert_eq!(decision.reason, "exhausted");
    }

    #[test]
    fn permanent_errors_never_retry() {
        let decision = policy().should_retry(
            &BroadcastError::InsufficientFunds {
                message: "balance too low".into(),
            },
            0,
        );
        assert!(!decision.retry);
        assert_eq!(decision.reason, "permanent");
    }

    #[test]
    fn nonce_too_high_is_engine_handled_not_retried() {
        let decision = policy().should_retry(
            &BroadcastError::NonceTooHigh {
                expected: 11,
                actual: 15,
            },
            0,
        );
        assert!(!decision.retry);
        assert_eq!(decision.reason, "nonce_gap");
    }

    #[test]
    fn transient_delay_is_exponential_with_jitter_within_bounds() {
        let decision = policy().should_retry(
            &BroadcastError::Network {
                message: "connection reset".into(),
            },
            2,
        );
        assert!(decision.retry);
        let base = 2.0 * 2f64.powi(2); // 8s
        assert!(decision.delay_seconds >= base * 0.75 - 1e-9);
        assert!(decision.delay_seconds <= base * 1.25 + 1e-9);
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let decision = policy().should_retry(
            &BroadcastError::Provider {
                message: "backend overloaded".into(),
            },
            4,
        );
        assert!(decision.retry);
        assert!(decision.delay_seconds <= 60.0 * 1.25 + 1e-9);
    }

    #[test]
    fn detects_nonce_too_low_conflict() {
        let conflict = policy()
            .detect_nonce_conflict(&BroadcastError::NonceTooLow {
                message: "nonce too low".into(),
            })
            .unwrap();
        assert_eq!(conflict.kind, NonceConflictKind::TooLow);
    }

    #[test]
    fn detects_nonce_too_high_conflict() {
        let conflict = policy()
            .detect_nonce_conflict(&BroadcastError::NonceTooHigh {
                expected: 11,
                actual: 15,
            })
            .unwrap();
        assert_eq!(conflict.kind, NonceConflictKind::TooHigh);
    }

    #[test]
    fn non_nonce_errors_have_no_conflict() {
        assert!(policy()
            .detect_nonce_conflict(&BroadcastError::Network {
                message: "timeout".into()
            })
            .is_none());
    }
}
