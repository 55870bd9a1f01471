// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Events emitted by the Ledger and the Bridge. Off-chain relayer tooling
//! follows these to discover deposits, ready batches and finished actions.
//! Events are buffered in the call context and only published when the
//! enclosing unit of work commits.

use crate::types::{BatchNonce, DepositNonce, DepositStatus, Timestamp, TokenLimits};
use ethers::types::Address as EthAddress;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Display)]
pub enum BridgeEvent {
    // Ledger
    TokenWhitelisted {
        token: EthAddress,
    },
    TokenRemovedFromWhitelist {
        token: EthAddress,
    },
    TokenLimitsChanged {
        token: EthAddress,
        limits: TokenLimits,
    },
    BridgeAuthorityChanged {
        authority: EthAddress,
    },
    BatchSizeChanged {
        batch_size: u16,
    },
    BatchTimeLimitChanged {
        time_limit: Timestamp,
    },
    BatchSettleWindowChanged {
        settle_window: Timestamp,
    },
    Deposited {
        nonce: DepositNonce,
        batch_nonce: BatchNonce,
    },
    UpdatedDepositStatus {
        nonce: DepositNonce,
        status: DepositStatus,
    },

    // Bridge
    RelayerAdded {
        relayer: EthAddress,
    },
    RelayerRemoved {
        relayer: EthAddress,
    },
    QuorumChanged {
        quorum: u64,
    },
    FinishedTransaction {
        nonce: DepositNonce,
        status: DepositStatus,
    },
    TransferExecuted {
        batch_nonce: BatchNonce,
    },

    // Both components
    Paused {
        by: EthAddress,
    },
    Unpaused {
        by: EthAddress,
    },
}
