// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::types::Address as EthAddress;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    // Caller lacks the admin, relayer or bridge-authority capability
    #[error("access denied: {0}")]
    AccessDenied(String),
    // Deposit or batch is not in the state the action requires
    #[error("invalid state: {0}")]
    InvalidState(String),
    // Not enough distinct valid relayer signatures
    #[error("quorum was not met: {valid} valid signatures, {required} required")]
    QuorumNotMet { valid: u64, required: u64 },
    // The same relayer signed the message more than once
    #[error("multiple signatures from the same relayer {0:?}")]
    DuplicateSigner(EthAddress),
    // The batch or deposit nonce was already executed
    #[error("nonce {0} was already executed")]
    ReplayRejected(u64),
    // Input violates a protocol policy (whitelist, limits, quorum minimum, zero address)
    #[error("policy violation: {0}")]
    PolicyViolation(String),
    // The component is paused
    #[error("bridge is paused")]
    BridgePaused,
    // The token contract reported a failed transfer
    #[error("token transfer failed: {0}")]
    TokenTransferFailed(String),
}

impl BridgeError {
    /// Returns a short string identifying the error type for metrics labels
    /// and for relayer tooling.
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::AccessDenied(_) => "access_denied",
            BridgeError::InvalidState(_) => "invalid_state",
            BridgeError::QuorumNotMet { .. } => "quorum_not_met",
            BridgeError::DuplicateSigner(_) => "duplicate_signer",
            BridgeError::ReplayRejected(_) => "replay_rejected",
            BridgeError::PolicyViolation(_) => "policy_violation",
            BridgeError::BridgePaused => "bridge_paused",
            BridgeError::TokenTransferFailed(_) => "token_transfer_failed",
        }
    }

    /// Whether resubmitting the same action can succeed later, e.g. with more
    /// signatures or once the bridge is unpaused. Everything else is
    /// permanently invalid as submitted.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::QuorumNotMet { .. }
                | BridgeError::BridgePaused
                | BridgeError::TokenTransferFailed(_)
        )
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn all_errors() -> Vec<BridgeError> {
        vec![
            BridgeError::AccessDenied("test".to_string()),
            BridgeError::InvalidState("test".to_string()),
            BridgeError::QuorumNotMet {
                valid: 6,
                required: 7,
            },
            BridgeError::DuplicateSigner(EthAddress::repeat_byte(1)),
            BridgeError::ReplayRejected(1),
            BridgeError::PolicyViolation("test".to_string()),
            BridgeError::BridgePaused,
            BridgeError::TokenTransferFailed("test".to_string()),
        ]
    }

    /// Test that error_type values are valid Prometheus label values
    /// (lowercase, underscores only, no spaces or special chars)
    #[test]
    fn test_error_type_valid_prometheus_labels() {
        for error in all_errors() {
            let error_type = error.error_type();
            assert!(!error_type.is_empty(), "error_type should not be empty");
            for c in error_type.chars() {
                assert!(
                    c.is_ascii_lowercase() || c == '_',
                    "error_type '{}' contains invalid character '{}' for Prometheus label",
                    error_type,
                    c
                );
            }
            assert!(!error_type.starts_with('_'));
            assert!(!error_type.ends_with('_'));
        }
    }

    #[test]
    fn test_error_types_are_unique() {
        let mut types: Vec<_> = all_errors().iter().map(|e| e.error_type()).collect();
        types.sort();
        types.dedup();
        assert_eq!(types.len(), all_errors().len());
    }

    #[test]
    fn test_error_type_payload_independence() {
        let err1 = BridgeError::PolicyViolation("short".to_string());
        let err2 = BridgeError::PolicyViolation("a much longer explanation".to_string());
        assert_eq!(err1.error_type(), err2.error_type());
        assert_eq!(
            BridgeError::ReplayRejected(1).error_type(),
            BridgeError::ReplayRejected(99).error_type()
        );
    }

    /// Relayer tooling keys off this split: only these may succeed on resubmission.
    #[test]
    fn test_retryable_classification() {
        let retryable: Vec<_> = all_errors()
            .into_iter()
            .filter(|e| e.is_retryable())
            .map(|e| e.error_type())
            .collect();
        assert_eq!(
            retryable,
            vec!["quorum_not_met", "bridge_paused", "token_transfer_failed"]
        );
    }

    #[test]
    fn test_display_carries_reason() {
        let err = BridgeError::QuorumNotMet {
            valid: 6,
            required: 7,
        };
        let display = err.to_string();
        assert!(display.contains("6 valid"));
        assert!(display.contains("7 required"));
        assert!(BridgeError::ReplayRejected(12)
            .to_string()
            .contains("nonce 12"));
    }
}
