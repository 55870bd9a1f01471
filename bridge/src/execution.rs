// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Replay protection: every nonce the Bridge has acted on, per action kind.
//! Entries are never removed.

use crate::journal::{Journaled, SetUndoLog};
use crate::types::{BatchNonce, DepositNonce};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    finished_batches: BTreeSet<BatchNonce>,
    executed_transfers: BTreeSet<BatchNonce>,
    finished_deposits: BTreeSet<DepositNonce>,
    #[serde(skip)]
    batches_log: SetUndoLog<BatchNonce>,
    #[serde(skip)]
    transfers_log: SetUndoLog<BatchNonce>,
    #[serde(skip)]
    deposits_log: SetUndoLog<DepositNonce>,
}

impl ExecutionRecord {
    pub fn was_batch_finished(&self, nonce: BatchNonce) -> bool {
        self.finished_batches.contains(&nonce)
    }

    pub fn was_batch_executed(&self, nonce: BatchNonce) -> bool {
        self.executed_transfers.contains(&nonce)
    }

    pub fn was_deposit_finished(&self, nonce: DepositNonce) -> bool {
        self.finished_deposits.contains(&nonce)
    }

    /// Returns false if the batch was already recorded.
    pub(crate) fn record_finished_batch(&mut self, nonce: BatchNonce) -> bool {
        self.batches_log.insert(&mut self.finished_batches, nonce)
    }

    pub(crate) fn record_executed_transfer(&mut self, nonce: BatchNonce) -> bool {
        self.transfers_log.insert(&mut self.executed_transfers, nonce)
    }

    pub(crate) fn record_finished_deposit(&mut self, nonce: DepositNonce) -> bool {
        self.deposits_log.insert(&mut self.finished_deposits, nonce)
    }
}

impl Journaled for ExecutionRecord {
    fn begin(&mut self) {
        self.batches_log.begin();
        self.transfers_log.begin();
        self.deposits_log.begin();
    }

    fn commit(&mut self) {
        self.batches_log.commit();
        self.transfers_log.commit();
        self.deposits_log.commit();
    }

    fn rollback(&mut self) {
        self.batches_log.rollback(&mut self.finished_batches);
        self.transfers_log.rollback(&mut self.executed_transfers);
        self.deposits_log.rollback(&mut self.finished_deposits);
    }
}
