// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Relayer quorum rules and signature counting.

use crate::access::CapabilityCheck;
use crate::crypto::recover_relayer;
use crate::error::{BridgeError, BridgeResult};
use crate::metrics::BridgeMetrics;
use ethers::types::{Address as EthAddress, H256};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// No quorum below this is accepted, however few relayers are registered.
pub const MINIMUM_QUORUM: u64 = 3;

/// A quorum must be at least [`MINIMUM_QUORUM`], reachable with the
/// registered relayers, and a strict majority of them.
pub fn ensure_valid_quorum(quorum: u64, relayer_count: u64) -> BridgeResult<()> {
    if quorum < MINIMUM_QUORUM {
        return Err(BridgeError::PolicyViolation(format!(
            "quorum {quorum} is below the minimum of {MINIMUM_QUORUM}"
        )));
    }
    if quorum > relayer_count {
        return Err(BridgeError::PolicyViolation(format!(
            "quorum {quorum} exceeds the {relayer_count} registered relayers"
        )));
    }
    if quorum.saturating_mul(2) <= relayer_count {
        return Err(BridgeError::PolicyViolation(format!(
            "quorum {quorum} is not a majority of {relayer_count} relayers"
        )));
    }
    Ok(())
}

/// Counts the distinct registered relayers that signed `hash`.
///
/// Signatures that are malformed or recover to a non-relayer are skipped.
/// A relayer appearing twice aborts with [`BridgeError::DuplicateSigner`].
pub fn verify_quorum<R: CapabilityCheck>(
    hash: &H256,
    signatures: &[Vec<u8>],
    roles: &R,
    quorum: u64,
    metrics: &BridgeMetrics,
) -> BridgeResult<BTreeSet<EthAddress>> {
    let mut signers = BTreeSet::new();
    for (index, signature) in signatures.iter().enumerate() {
        let Some(relayer) =
            recover_relayer(hash, signature, |address| roles.has_relayer_capability(address))
        else {
            warn!(index, ?hash, "Skipping signature that is not from a relayer");
            metrics
                .signature_verifications
                .with_label_values(&["rejected"])
                .inc();
            continue;
        };
        if !signers.insert(relayer) {
            warn!(?relayer, "Relayer signed more than once");
            metrics
                .signature_verifications
                .with_label_values(&["duplicate"])
                .inc();
            return Err(BridgeError::DuplicateSigner(relayer));
        }
        debug!(index, ?relayer, "Accepted relayer signature");
        metrics
            .signature_verifications
            .with_label_values(&["valid"])
            .inc();
    }

    let valid = signers.len() as u64;
    if valid < quorum {
        return Err(BridgeError::QuorumNotMet {
            valid,
            required: quorum,
        });
    }
    Ok(signers)
}
