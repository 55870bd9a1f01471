// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The fungible-token primitive the Ledger takes custody through.
//!
//! The bridge only relies on the four operations below. A `false` result is a
//! failed transfer and is surfaced to the caller as
//! [`BridgeError::TokenTransferFailed`](crate::error::BridgeError).

use crate::journal::{Journaled, MapUndoLog};
use ethers::types::{Address as EthAddress, U256};
use std::collections::BTreeMap;
use tracing::debug;

pub trait TokenContract {
    fn approve(
        &mut self,
        token: EthAddress,
        owner: EthAddress,
        spender: EthAddress,
        amount: U256,
    ) -> bool;

    /// Moves `amount` from `from` to `to` using the allowance `from` granted
    /// to `spender`.
    fn transfer_from(
        &mut self,
        token: EthAddress,
        spender: EthAddress,
        from: EthAddress,
        to: EthAddress,
        amount: U256,
    ) -> bool;

    fn transfer(&mut self, token: EthAddress, from: EthAddress, to: EthAddress, amount: U256)
        -> bool;

    fn balance_of(&self, token: EthAddress, account: EthAddress) -> U256;
}

/// Balances and allowances for any number of tokens, kept in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryTokenContract {
    balances: BTreeMap<BalanceKey, U256>,
    allowances: BTreeMap<AllowanceKey, U256>,
    balances_log: MapUndoLog<BalanceKey, U256>,
    allowances_log: MapUndoLog<AllowanceKey, U256>,
}

// (token, holder)
type BalanceKey = (EthAddress, EthAddress);
// (token, owner, spender)
type AllowanceKey = (EthAddress, EthAddress, EthAddress);

impl InMemoryTokenContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, token: EthAddress, to: EthAddress, amount: U256) {
        self.credit(token, to, amount);
    }

    fn credit(&mut self, token: EthAddress, to: EthAddress, amount: U256) {
        self.balances_log.save(&self.balances, &(token, to));
        let balance = self.balances.entry((token, to)).or_default();
        *balance = balance.saturating_add(amount);
    }

    fn set_allowance(
        &mut self,
        token: EthAddress,
        owner: EthAddress,
        spender: EthAddress,
        amount: U256,
    ) {
        let key = (token, owner, spender);
        self.allowances_log.save(&self.allowances, &key);
        self.allowances.insert(key, amount);
    }

    pub fn allowance(&self, token: EthAddress, owner: EthAddress, spender: EthAddress) -> U256 {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn move_balance(
        &mut self,
        token: EthAddress,
        from: EthAddress,
        to: EthAddress,
        amount: U256,
    ) -> bool {
        let from_balance = self.balance_of(token, from);
        if from_balance < amount {
            debug!(
                ?token,
                ?from,
                %from_balance,
                %amount,
                "Insufficient balance for token transfer"
            );
            return false;
        }
        self.balances_log.save(&self.balances, &(token, from));
        self.balances.insert((token, from), from_balance - amount);
        self.credit(token, to, amount);
        true
    }
}

impl Journaled for InMemoryTokenContract {
    fn begin(&mut self) {
        self.balances_log.begin();
        self.allowances_log.begin();
    }

    fn commit(&mut self) {
        self.balances_log.commit();
        self.allowances_log.commit();
    }

    fn rollback(&mut self) {
        self.balances_log.rollback(&mut self.balances);
        self.allowances_log.rollback(&mut self.allowances);
    }
}

impl TokenContract for InMemoryTokenContract {
    fn approve(
        &mut self,
        token: EthAddress,
        owner: EthAddress,
        spender: EthAddress,
        amount: U256,
    ) -> bool {
        self.set_allowance(token, owner, spender, amount);
        true
    }

    fn transfer_from(
        &mut self,
        token: EthAddress,
        spender: EthAddress,
        from: EthAddress,
        to: EthAddress,
        amount: U256,
    ) -> bool {
        let allowance = self.allowance(token, from, spender);
        if allowance < amount {
            debug!(?token, ?from, ?spender, %allowance, %amount, "Insufficient allowance");
            return false;
        }
        if !self.move_balance(token, from, to, amount) {
            return false;
        }
        self.set_allowance(token, from, spender, allowance - amount);
        true
    }

    fn transfer(
        &mut self,
        token: EthAddress,
        from: EthAddress,
        to: EthAddress,
        amount: U256,
    ) -> bool {
        self.move_balance(token, from, to, amount)
    }

    fn balance_of(&self, token: EthAddress, account: EthAddress) -> U256 {
        self.balances
            .get(&(token, account))
            .copied()
            .unwrap_or_default()
    }
}
