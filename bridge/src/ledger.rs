// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The deposit Ledger: token custody, whitelist policy and batch
//! accumulation.
//!
//! Deposits get contiguous nonces starting at 1 and are appended to the
//! current batch in arrival order. Only the bound bridge authority may move a
//! deposit to a terminal status, and only the oldest pending one, so
//! settlement is strictly FIFO by nonce.

use crate::access::{CapabilityCheck, Roles};
use crate::batch::{BatchPolicy, BatchRecord};
use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;
use crate::journal::{Journaled, MapUndoLog};
use crate::token::TokenContract;
use crate::types::{
    Batch, BatchNonce, CallContext, Deposit, DepositNonce, DepositStatus, Timestamp, TokenLimits,
};
use ethers::types::{Address as EthAddress, U256};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct Ledger {
    // Custody account holding every locked token
    address: EthAddress,
    roles: Roles,
    bridge_authority: Option<EthAddress>,
    whitelist: BTreeMap<EthAddress, TokenLimits>,
    policy: BatchPolicy,
    deposits: BTreeMap<DepositNonce, Deposit>,
    batches: BTreeMap<BatchNonce, BatchRecord>,
    deposits_count: u64,
    batches_count: u64,
    next_pending_deposit: DepositNonce,
    next_pending_batch: BatchNonce,
    paused: bool,
    // Undo state of the open unit of work
    saved_header: Option<LedgerHeader>,
    deposits_log: MapUndoLog<DepositNonce, Deposit>,
    batches_log: MapUndoLog<BatchNonce, BatchRecord>,
}

// Everything except the deposit and batch tables; small enough to copy once
// per unit of work.
#[derive(Clone, Debug)]
struct LedgerHeader {
    roles: Roles,
    bridge_authority: Option<EthAddress>,
    whitelist: BTreeMap<EthAddress, TokenLimits>,
    policy: BatchPolicy,
    deposits_count: u64,
    batches_count: u64,
    next_pending_deposit: DepositNonce,
    next_pending_batch: BatchNonce,
    paused: bool,
}

impl Ledger {
    pub fn new(
        address: EthAddress,
        admins: impl IntoIterator<Item = EthAddress>,
        policy: BatchPolicy,
    ) -> Self {
        Self {
            address,
            roles: Roles::new(admins),
            bridge_authority: None,
            whitelist: BTreeMap::new(),
            policy,
            deposits: BTreeMap::new(),
            batches: BTreeMap::new(),
            deposits_count: 0,
            batches_count: 0,
            next_pending_deposit: 1,
            next_pending_batch: 1,
            paused: false,
            saved_header: None,
            deposits_log: MapUndoLog::default(),
            batches_log: MapUndoLog::default(),
        }
    }

    pub fn address(&self) -> EthAddress {
        self.address
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn policy(&self) -> &BatchPolicy {
        &self.policy
    }

    pub fn bridge_authority(&self) -> Option<EthAddress> {
        self.bridge_authority
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // ---------------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------------

    pub(crate) fn whitelist(
        &mut self,
        ctx: &mut CallContext,
        token: EthAddress,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        ensure_non_zero(&token, "token")?;
        if self.whitelist.contains_key(&token) {
            debug!(?token, "Token already whitelisted");
            return Ok(());
        }
        self.whitelist.insert(token, TokenLimits::default());
        info!(?token, "Token whitelisted");
        ctx.emit(BridgeEvent::TokenWhitelisted { token });
        Ok(())
    }

    pub(crate) fn remove_from_whitelist(
        &mut self,
        ctx: &mut CallContext,
        token: EthAddress,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        if self.whitelist.remove(&token).is_none() {
            debug!(?token, "Token was not whitelisted");
            return Ok(());
        }
        info!(?token, "Token removed from whitelist");
        ctx.emit(BridgeEvent::TokenRemovedFromWhitelist { token });
        Ok(())
    }

    pub(crate) fn set_token_limits(
        &mut self,
        ctx: &mut CallContext,
        token: EthAddress,
        limits: TokenLimits,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        if limits.max.is_some_and(|max| max < limits.min) {
            return Err(BridgeError::PolicyViolation(format!(
                "maximum deposit for {token:?} is below the minimum"
            )));
        }
        let entry = self.whitelist.get_mut(&token).ok_or_else(|| {
            BridgeError::PolicyViolation(format!("token {token:?} is not whitelisted"))
        })?;
        *entry = limits.clone();
        info!(?token, ?limits, "Token limits changed");
        ctx.emit(BridgeEvent::TokenLimitsChanged { token, limits });
        Ok(())
    }

    pub(crate) fn set_bridge_authority(
        &mut self,
        ctx: &mut CallContext,
        authority: EthAddress,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        ensure_non_zero(&authority, "bridge authority")?;
        self.bridge_authority = Some(authority);
        info!(?authority, "Bridge authority changed");
        ctx.emit(BridgeEvent::BridgeAuthorityChanged { authority });
        Ok(())
    }

    pub(crate) fn set_batch_size(
        &mut self,
        ctx: &mut CallContext,
        batch_size: u16,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        BatchPolicy::check_batch_size(batch_size)?;
        self.seal_current_batch_if_ready(ctx.timestamp());
        self.policy.set_batch_size(batch_size)?;
        info!(batch_size, "Batch size changed");
        ctx.emit(BridgeEvent::BatchSizeChanged { batch_size });
        Ok(())
    }

    pub(crate) fn set_batch_time_limit(
        &mut self,
        ctx: &mut CallContext,
        time_limit: Timestamp,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        self.seal_current_batch_if_ready(ctx.timestamp());
        self.policy.set_time_limit(time_limit);
        info!(time_limit, "Batch time limit changed");
        ctx.emit(BridgeEvent::BatchTimeLimitChanged { time_limit });
        Ok(())
    }

    pub(crate) fn set_batch_settle_window(
        &mut self,
        ctx: &mut CallContext,
        settle_window: Timestamp,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        self.seal_current_batch_if_ready(ctx.timestamp());
        self.policy.set_settle_window(settle_window);
        info!(settle_window, "Batch settle window changed");
        ctx.emit(BridgeEvent::BatchSettleWindowChanged { settle_window });
        Ok(())
    }

    pub(crate) fn pause(&mut self, ctx: &mut CallContext) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        if !self.paused {
            self.paused = true;
            info!("Ledger paused");
            ctx.emit(BridgeEvent::Paused { by: ctx.sender() });
        }
        Ok(())
    }

    pub(crate) fn unpause(&mut self, ctx: &mut CallContext) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        if self.paused {
            self.paused = false;
            info!("Ledger unpaused");
            ctx.emit(BridgeEvent::Unpaused { by: ctx.sender() });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Deposits
    // ---------------------------------------------------------------------

    /// Locks `amount` of `token` from the caller into custody and appends a
    /// pending deposit to the current batch. The caller must have approved
    /// the Ledger's custody address beforehand.
    pub(crate) fn deposit<T: TokenContract>(
        &mut self,
        ctx: &mut CallContext,
        tokens: &mut T,
        token: EthAddress,
        amount: U256,
        recipient: Vec<u8>,
    ) -> BridgeResult<DepositNonce> {
        if self.paused {
            return Err(BridgeError::BridgePaused);
        }
        let limits = self.whitelist.get(&token).ok_or_else(|| {
            BridgeError::PolicyViolation(format!("unsupported token {token:?}"))
        })?;
        if amount.is_zero() {
            return Err(BridgeError::PolicyViolation(
                "deposit amount must be greater than zero".into(),
            ));
        }
        if !limits.allows(amount) {
            return Err(BridgeError::PolicyViolation(format!(
                "deposit amount {amount} for {token:?} is outside the allowed limits"
            )));
        }

        let depositor = ctx.sender();
        if !tokens.transfer_from(token, self.address, depositor, self.address, amount) {
            return Err(BridgeError::TokenTransferFailed(format!(
                "transferFrom of {amount} {token:?} from {depositor:?} failed"
            )));
        }

        let nonce = self.deposits_count + 1;
        self.deposits_count = nonce;
        self.deposits_log.save(&self.deposits, &nonce);
        self.deposits.insert(
            nonce,
            Deposit {
                nonce,
                token_address: token,
                amount,
                depositor,
                recipient,
                status: DepositStatus::Pending,
            },
        );
        let batch_nonce = self.append_to_current_batch(nonce, ctx.timestamp());

        info!(nonce, batch_nonce, ?token, %amount, ?depositor, "Deposit created");
        ctx.emit(BridgeEvent::Deposited { nonce, batch_nonce });
        Ok(nonce)
    }

    // Opens a new batch when the current one is full, ready or already being
    // settled. A batch that fills up is sealed right away.
    fn append_to_current_batch(&mut self, deposit: DepositNonce, now: Timestamp) -> BatchNonce {
        let policy = self.policy;
        let reusable = self
            .batches
            .get(&self.batches_count)
            .is_some_and(|batch| batch.accepts_deposits(&policy, now));
        if !reusable {
            self.batches_count += 1;
            debug!(batch_nonce = self.batches_count, "Opened new batch");
        }
        let batch_nonce = self.batches_count;
        self.batches_log.save(&self.batches, &batch_nonce);
        let batch = self
            .batches
            .entry(batch_nonce)
            .or_insert_with(|| BatchRecord::open(batch_nonce, now));
        batch.push(deposit, now);
        if policy.is_full(batch) {
            batch.sealed = true;
            debug!(batch_nonce, "Batch is full");
        }
        batch_nonce
    }

    // Keeps a batch that is already ready at `now` closed under the policy
    // about to be installed.
    fn seal_current_batch_if_ready(&mut self, now: Timestamp) {
        let batch_nonce = self.batches_count;
        let ready = self.batches.get(&batch_nonce).is_some_and(|batch| {
            !batch.sealed && !batch.finalized && self.policy.is_ready(batch, now)
        });
        if ready {
            self.batches_log.save(&self.batches, &batch_nonce);
            if let Some(batch) = self.batches.get_mut(&batch_nonce) {
                batch.sealed = true;
                debug!(batch_nonce, "Sealed ready batch before policy change");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn get_deposit(&self, nonce: DepositNonce) -> Option<&Deposit> {
        self.deposits.get(&nonce)
    }

    pub fn get_batch(&self, nonce: BatchNonce) -> Option<Batch> {
        self.batches.get(&nonce).map(|record| self.materialize(record))
    }

    pub fn deposits_count(&self) -> u64 {
        self.deposits_count
    }

    pub fn batches_count(&self) -> u64 {
        self.batches_count
    }

    /// Deposits that have not reached a terminal status yet.
    pub fn pending_deposits_count(&self) -> u64 {
        self.deposits_count + 1 - self.next_pending_deposit
    }

    pub fn is_token_whitelisted(&self, token: &EthAddress) -> bool {
        self.whitelist.contains_key(token)
    }

    pub fn token_limits(&self, token: &EthAddress) -> Option<&TokenLimits> {
        self.whitelist.get(token)
    }

    /// The oldest deposit that has not reached a terminal status.
    pub fn get_next_pending_deposit(&self) -> Option<&Deposit> {
        self.deposits
            .get(&self.next_pending_deposit)
            .filter(|deposit| deposit.status.is_open())
    }

    /// The oldest unfinalized batch, if it is ready for settlement at `now`.
    pub fn get_next_pending_batch(&self, now: Timestamp) -> Option<Batch> {
        let record = self.batches.get(&self.next_pending_batch)?;
        if record.finalized || record.deposits.is_empty() {
            return None;
        }
        if !record.sealed && !self.policy.is_ready(record, now) {
            return None;
        }
        Some(self.materialize(record))
    }

    fn materialize(&self, record: &BatchRecord) -> Batch {
        Batch {
            nonce: record.nonce,
            deposits: record
                .deposits
                .iter()
                .filter_map(|nonce| self.deposits.get(nonce).cloned())
                .collect(),
            created_at: record.created_at,
            last_updated: record.last_updated,
            finalized: record.finalized,
        }
    }

    // ---------------------------------------------------------------------
    // Bridge-only entry points
    // ---------------------------------------------------------------------

    fn ensure_bridge_authority(&self, caller: &EthAddress) -> BridgeResult<()> {
        match self.bridge_authority {
            None => Err(BridgeError::AccessDenied(
                "bridge authority has not been set".into(),
            )),
            Some(authority) if authority == *caller => Ok(()),
            Some(_) => Err(BridgeError::AccessDenied(format!(
                "{caller:?} is not the bridge authority"
            ))),
        }
    }

    /// Moves the oldest pending deposit to `status` and advances the pending
    /// pointer. Finalizing the last deposit of a batch finalizes the batch.
    pub(crate) fn finalize_next_pending_deposit(
        &mut self,
        ctx: &mut CallContext,
        status: DepositStatus,
    ) -> BridgeResult<DepositNonce> {
        self.ensure_bridge_authority(&ctx.sender())?;
        if !status.is_terminal() {
            return Err(BridgeError::InvalidState(format!(
                "{status} is not a final deposit status"
            )));
        }
        let nonce = self.next_pending_deposit;
        let batch_nonce = self.next_pending_batch;
        self.deposits_log.save(&self.deposits, &nonce);
        self.batches_log.save(&self.batches, &batch_nonce);
        let deposit = self
            .deposits
            .get_mut(&nonce)
            .filter(|deposit| deposit.status.is_open())
            .ok_or_else(|| BridgeError::InvalidState("no pending deposit".into()))?;
        deposit.status = status;

        let batch = self
            .batches
            .get_mut(&batch_nonce)
            .filter(|batch| batch.deposits.contains(&nonce))
            .ok_or_else(|| {
                BridgeError::InvalidState(format!("deposit {nonce} is not in the pending batch"))
            })?;
        batch.sealed = true;
        if batch.last_deposit() == Some(nonce) {
            batch.finalized = true;
            info!(batch_nonce = batch.nonce, "Batch finalized");
            self.next_pending_batch += 1;
        }
        self.next_pending_deposit += 1;

        debug!(nonce, %status, "Deposit status updated");
        ctx.emit(BridgeEvent::UpdatedDepositStatus { nonce, status });
        Ok(nonce)
    }

    /// Releases `amount` of `token` from custody to `recipient`.
    pub(crate) fn transfer_out<T: TokenContract>(
        &mut self,
        ctx: &mut CallContext,
        tokens: &mut T,
        token: EthAddress,
        amount: U256,
        recipient: EthAddress,
    ) -> BridgeResult<()> {
        self.ensure_bridge_authority(&ctx.sender())?;
        if !tokens.transfer(token, self.address, recipient, amount) {
            return Err(BridgeError::TokenTransferFailed(format!(
                "transfer of {amount} {token:?} to {recipient:?} failed"
            )));
        }
        debug!(?token, %amount, ?recipient, "Released tokens from custody");
        Ok(())
    }
}

impl Ledger {
    fn header(&self) -> LedgerHeader {
        LedgerHeader {
            roles: self.roles.clone(),
            bridge_authority: self.bridge_authority,
            whitelist: self.whitelist.clone(),
            policy: self.policy,
            deposits_count: self.deposits_count,
            batches_count: self.batches_count,
            next_pending_deposit: self.next_pending_deposit,
            next_pending_batch: self.next_pending_batch,
            paused: self.paused,
        }
    }
}

impl Journaled for Ledger {
    fn begin(&mut self) {
        self.saved_header = Some(self.header());
        self.deposits_log.begin();
        self.batches_log.begin();
    }

    fn commit(&mut self) {
        self.saved_header = None;
        self.deposits_log.commit();
        self.batches_log.commit();
    }

    fn rollback(&mut self) {
        if let Some(header) = self.saved_header.take() {
            self.roles = header.roles;
            self.bridge_authority = header.bridge_authority;
            self.whitelist = header.whitelist;
            self.policy = header.policy;
            self.deposits_count = header.deposits_count;
            self.batches_count = header.batches_count;
            self.next_pending_deposit = header.next_pending_deposit;
            self.next_pending_batch = header.next_pending_batch;
            self.paused = header.paused;
        }
        self.deposits_log.rollback(&mut self.deposits);
        self.batches_log.rollback(&mut self.batches);
    }
}

pub(crate) fn ensure_non_zero(address: &EthAddress, what: &str) -> BridgeResult<()> {
    if address.is_zero() {
        return Err(BridgeError::PolicyViolation(format!(
            "{what} must not be the zero address"
        )));
    }
    Ok(())
}
