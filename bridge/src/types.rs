// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::events::BridgeEvent;
use ethers::types::{Address as EthAddress, U256};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

pub type DepositNonce = u64;
pub type BatchNonce = u64;
/// Seconds, as reported by the host ledger for the current call.
pub type Timestamp = u64;

/// Lifecycle of a single deposit. The numeric codes are the ones relayers
/// sign over, so they must never be reordered.
#[derive(
    Debug,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    TryFromPrimitive,
    Display,
)]
#[repr(u8)]
pub enum DepositStatus {
    None = 0,
    Pending = 1,
    InProgress = 2,
    Executed = 3,
    Rejected = 4,
}

impl Default for DepositStatus {
    fn default() -> Self {
        DepositStatus::None
    }
}

impl DepositStatus {
    /// Executed and Rejected are the only statuses a relayer quorum may set.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DepositStatus::Executed | DepositStatus::Rejected)
    }

    /// Statuses that can still be moved to a terminal status.
    pub fn is_open(&self) -> bool {
        matches!(self, DepositStatus::Pending | DepositStatus::InProgress)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deposit {
    pub nonce: DepositNonce,
    pub token_address: EthAddress,
    pub amount: U256,
    pub depositor: EthAddress,
    // Destination-chain address, opaque to this side of the bridge
    pub recipient: Vec<u8>,
    pub status: DepositStatus,
}

/// Read view of a batch with its deposits materialized in arrival order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Batch {
    pub nonce: BatchNonce,
    pub deposits: Vec<Deposit>,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
    pub finalized: bool,
}

impl Batch {
    pub fn deposit_nonces(&self) -> impl Iterator<Item = DepositNonce> + '_ {
        self.deposits.iter().map(|d| d.nonce)
    }
}

/// Deposit bounds enforced per whitelisted token. `max` of `None` means
/// unbounded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenLimits {
    pub min: U256,
    pub max: Option<U256>,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            min: U256::one(),
            max: None,
        }
    }
}

impl TokenLimits {
    pub fn allows(&self, amount: U256) -> bool {
        amount >= self.min && self.max.map_or(true, |max| amount <= max)
    }
}

/// Per-call execution context: who is calling, the host timestamp, and the
/// events emitted so far. Events only become visible if the call commits.
#[derive(Debug)]
pub struct CallContext {
    sender: EthAddress,
    timestamp: Timestamp,
    events: Vec<BridgeEvent>,
}

impl CallContext {
    pub fn new(sender: EthAddress, timestamp: Timestamp) -> Self {
        Self {
            sender,
            timestamp,
            events: Vec::new(),
        }
    }

    pub fn sender(&self) -> EthAddress {
        self.sender
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn emit(&mut self, event: BridgeEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[BridgeEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<BridgeEvent> {
        self.events
    }

    /// Runs `f` as a nested call made by `sender` (e.g. the Bridge calling
    /// into the Ledger). Events emitted by the nested call stay in this
    /// context; the original sender is restored afterwards.
    pub fn call_as<R>(&mut self, sender: EthAddress, f: impl FnOnce(&mut Self) -> R) -> R {
        let outer = std::mem::replace(&mut self.sender, sender);
        let result = f(self);
        self.sender = outer;
        result
    }
}
