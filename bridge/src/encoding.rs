// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Canonical messages relayers sign.
//!
//! Each action is ABI-encoded together with a domain tag, hashed with
//! keccak256 and wrapped in the `"\x19Ethereum Signed Message:\n32"` envelope.
//! The tag keeps a signature over one action from being replayed as another.

use crate::types::{BatchNonce, DepositNonce, DepositStatus};
use ethers::abi::Token;
use ethers::types::{Address as EthAddress, H256, U256};
use ethers::utils::{hash_message, keccak256};

pub const FINISH_BATCH_TAG: &str = "CurrentPendingBatch";
pub const EXECUTE_TRANSFER_TAG: &str = "ExecuteBatchedTransfer";
pub const FINISH_TRANSACTION_TAG: &str = "CurrentPendingTransaction";

/// An action relayers agree on off-chain and then sign.
pub trait BridgeMessage {
    /// The ABI encoding of the action, tag included.
    fn as_payload_bytes(&self) -> Vec<u8>;

    fn message_hash(&self) -> H256 {
        hash_message(keccak256(self.as_payload_bytes()))
    }
}

/// Settles every deposit of `batch_nonce` with the given statuses, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishBatchMessage<'a> {
    pub batch_nonce: BatchNonce,
    pub statuses: &'a [DepositStatus],
}

impl BridgeMessage for FinishBatchMessage<'_> {
    fn as_payload_bytes(&self) -> Vec<u8> {
        ethers::abi::encode(&[
            Token::Uint(U256::from(self.batch_nonce)),
            Token::Array(
                self.statuses
                    .iter()
                    .map(|status| Token::Uint(U256::from(*status as u8)))
                    .collect(),
            ),
            Token::String(FINISH_BATCH_TAG.to_owned()),
        ])
    }
}

/// Releases `amounts[i]` of `tokens[i]` to `recipients[i]` for an inbound
/// batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecuteTransferMessage<'a> {
    pub recipients: &'a [EthAddress],
    pub tokens: &'a [EthAddress],
    pub amounts: &'a [U256],
    pub batch_nonce: BatchNonce,
}

impl BridgeMessage for ExecuteTransferMessage<'_> {
    fn as_payload_bytes(&self) -> Vec<u8> {
        ethers::abi::encode(&[
            address_array(self.recipients),
            address_array(self.tokens),
            Token::Array(self.amounts.iter().copied().map(Token::Uint).collect()),
            Token::Uint(U256::from(self.batch_nonce)),
            Token::String(EXECUTE_TRANSFER_TAG.to_owned()),
        ])
    }
}

/// Settles the single oldest pending deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishTransactionMessage {
    pub deposit_nonce: DepositNonce,
    pub status: DepositStatus,
}

impl BridgeMessage for FinishTransactionMessage {
    fn as_payload_bytes(&self) -> Vec<u8> {
        ethers::abi::encode(&[
            Token::Uint(U256::from(self.deposit_nonce)),
            Token::Uint(U256::from(self.status as u8)),
            Token::String(FINISH_TRANSACTION_TAG.to_owned()),
        ])
    }
}

fn address_array(addresses: &[EthAddress]) -> Token {
    Token::Array(addresses.iter().copied().map(Token::Address).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn word(value: usize) -> [u8; 32] {
        let mut word = [0u8; 32];
        U256::from(value).to_big_endian(&mut word);
        word
    }

    #[test]
    fn test_finish_batch_payload_layout() {
        let statuses = [DepositStatus::Executed, DepositStatus::Rejected];
        let message = FinishBatchMessage {
            batch_nonce: 1,
            statuses: &statuses,
        };
        let bytes = message.as_payload_bytes();
        // head: nonce, offset of statuses, offset of tag
        assert_eq!(bytes[..32], word(1));
        assert_eq!(bytes[32..64], word(0x60));
        assert_eq!(bytes[64..96], word(0xc0));
        // statuses: length then one word per status
        assert_eq!(bytes[96..128], word(2));
        assert_eq!(bytes[128..160], word(3));
        assert_eq!(bytes[160..192], word(4));
        // tag: length then right-padded utf8
        assert_eq!(
            bytes[192..224],
            word(FINISH_BATCH_TAG.len())
        );
        assert_eq!(
            &bytes[224..224 + FINISH_BATCH_TAG.len()],
            FINISH_BATCH_TAG.as_bytes()
        );
        assert_eq!(bytes.len(), 256);
    }

    #[test]
    fn test_message_hash_uses_signed_message_envelope() {
        let message = FinishTransactionMessage {
            deposit_nonce: 7,
            status: DepositStatus::Executed,
        };
        let inner = keccak256(message.as_payload_bytes());
        let mut envelope = b"\x19Ethereum Signed Message:\n32".to_vec();
        envelope.extend_from_slice(&inner);
        assert_eq!(message.message_hash(), H256::from(keccak256(envelope)));
    }

    #[test]
    fn test_any_changed_field_changes_hash() {
        let statuses = [DepositStatus::Executed; 3];
        let base = FinishBatchMessage {
            batch_nonce: 5,
            statuses: &statuses,
        }
        .message_hash();

        let other_nonce = FinishBatchMessage {
            batch_nonce: 6,
            statuses: &statuses,
        }
        .message_hash();
        assert_ne!(base, other_nonce);

        let mut flipped = statuses;
        flipped[2] = DepositStatus::Rejected;
        let other_status = FinishBatchMessage {
            batch_nonce: 5,
            statuses: &flipped,
        }
        .message_hash();
        assert_ne!(base, other_status);

        let shorter = FinishBatchMessage {
            batch_nonce: 5,
            statuses: &statuses[..2],
        }
        .message_hash();
        assert_ne!(base, shorter);
    }

    #[test]
    fn test_domain_tags_separate_messages() {
        // same nonce and status under two different actions
        let single = FinishTransactionMessage {
            deposit_nonce: 1,
            status: DepositStatus::Executed,
        }
        .message_hash();
        let batch = FinishBatchMessage {
            batch_nonce: 1,
            statuses: &[DepositStatus::Executed],
        }
        .message_hash();
        assert_ne!(single, batch);
    }

    #[test]
    fn test_execute_transfer_encodes_recipients_first() {
        let token = EthAddress::from(hex!("00000000000000000000000000000000000000aa"));
        let recipient = EthAddress::from(hex!("00000000000000000000000000000000000000bb"));
        let message = ExecuteTransferMessage {
            recipients: &[recipient],
            tokens: &[token],
            amounts: &[U256::from(10)],
            batch_nonce: 3,
        };
        let bytes = message.as_payload_bytes();
        // five head words, then recipients at 0xa0 and tokens at 0xe0
        assert_eq!(bytes[..32], word(0xa0));
        assert_eq!(bytes[32..64], word(0xe0));
        assert_eq!(bytes[0xc0 + 12..0xe0], recipient.0);
        assert_eq!(bytes[0x100 + 12..0x120], token.0);

        let swapped = ExecuteTransferMessage {
            recipients: &[token],
            tokens: &[recipient],
            ..message.clone()
        };
        assert_ne!(message.message_hash(), swapped.message_hash());
    }
}
