// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use ethers::core::k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::types::{Address as EthAddress, H256};
use fastcrypto::hash::{HashFunction, Keccak256};
use tap::TapFallible;
use tracing::debug;

/// `r || s || v`
pub const SIGNATURE_LENGTH: usize = 65;
// Offset between the Ethereum-style recovery byte and the raw recovery id.
const ETH_RECOVERY_OFFSET: u8 = 27;

pub type RelayerSigningKey = SigningKey;

pub fn to_eth_address(key: &VerifyingKey) -> EthAddress {
    let affine: &ethers::core::k256::AffinePoint = key.as_ref();
    let encoded = affine.to_encoded_point(false);
    // skip the 0x04 tag of the uncompressed point
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]).digest;
    EthAddress::from_slice(&hash[12..])
}

/// The recovery ids `v` may stand for. Signers emit either the raw `0/1`
/// form or the Ethereum `27/28` form, so both readings are tried.
pub fn recovery_id_candidates(v: u8) -> Vec<RecoveryId> {
    [Some(v), v.checked_sub(ETH_RECOVERY_OFFSET)]
        .into_iter()
        .flatten()
        .filter(|id| *id <= 1)
        .filter_map(RecoveryId::from_byte)
        .collect()
}

/// Every address `signature` recovers to over `hash`, in candidate order.
/// Malformed signatures recover to nothing.
pub fn recover_addresses(hash: &H256, signature: &[u8]) -> Vec<EthAddress> {
    if signature.len() != SIGNATURE_LENGTH {
        debug!(len = signature.len(), "Signature has unexpected length");
        return vec![];
    }
    let Ok(sig) = Signature::from_slice(&signature[..64])
        .tap_err(|e| debug!("Failed to parse signature: {:?}", e))
    else {
        return vec![];
    };
    recovery_id_candidates(signature[64])
        .into_iter()
        .filter_map(|id| {
            VerifyingKey::recover_from_prehash(hash.as_bytes(), &sig, id)
                .tap_err(|e| debug!(?id, "Public key recovery failed: {:?}", e))
                .ok()
        })
        .map(|key| to_eth_address(&key))
        .collect()
}

/// The first address recovered from `signature` that satisfies `is_relayer`.
pub fn recover_relayer(
    hash: &H256,
    signature: &[u8],
    is_relayer: impl Fn(&EthAddress) -> bool,
) -> Option<EthAddress> {
    recover_addresses(hash, signature)
        .into_iter()
        .find(|address| is_relayer(address))
}

/// Signs a prehashed message, producing the `27/28` encoding relayers
/// submit.
pub fn sign_message_hash(
    key: &RelayerSigningKey,
    hash: &H256,
) -> Result<Vec<u8>, ethers::core::k256::ecdsa::Error> {
    let (sig, recovery_id) = key.sign_prehash_recoverable(hash.as_bytes())?;
    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + ETH_RECOVERY_OFFSET);
    Ok(bytes)
}
