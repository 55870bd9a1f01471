// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The Bridge: relayer set, quorum and the quorum-gated settlement actions.
//!
//! Every settlement action is checked in the same order: relayer capability,
//! pause switch, replay record, current Ledger state, message shape and
//! finally the signature quorum. The Bridge then calls into the Ledger under
//! its own identity, which the Ledger accepts as its bridge authority.

use crate::access::{CapabilityCheck, Roles};
use crate::encoding::{
    BridgeMessage, ExecuteTransferMessage, FinishBatchMessage, FinishTransactionMessage,
};
use crate::error::{BridgeError, BridgeResult};
use crate::events::BridgeEvent;
use crate::execution::ExecutionRecord;
use crate::journal::Journaled;
use crate::ledger::{ensure_non_zero, Ledger};
use crate::metrics::BridgeMetrics;
use crate::quorum::{ensure_valid_quorum, verify_quorum};
use crate::token::TokenContract;
use crate::types::{BatchNonce, CallContext, DepositNonce, DepositStatus};
use ethers::types::{Address as EthAddress, U256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct Bridge {
    // Identity the Bridge uses when calling into the Ledger
    address: EthAddress,
    roles: Roles,
    quorum: u64,
    executions: ExecutionRecord,
    paused: bool,
    metrics: Arc<BridgeMetrics>,
    saved_header: Option<(Roles, u64, bool)>,
}

impl Bridge {
    pub fn new(
        address: EthAddress,
        admins: impl IntoIterator<Item = EthAddress>,
        relayers: impl IntoIterator<Item = EthAddress>,
        quorum: u64,
        metrics: Arc<BridgeMetrics>,
    ) -> BridgeResult<Self> {
        let mut roles = Roles::new(admins);
        for relayer in relayers {
            ensure_non_zero(&relayer, "relayer")?;
            if !roles.insert_relayer(relayer) {
                return Err(BridgeError::InvalidState(format!(
                    "relayer {relayer:?} is listed more than once"
                )));
            }
        }
        ensure_valid_quorum(quorum, roles.relayer_count())?;
        Ok(Self {
            address,
            roles,
            quorum,
            executions: ExecutionRecord::default(),
            paused: false,
            metrics,
            saved_header: None,
        })
    }

    pub fn address(&self) -> EthAddress {
        self.address
    }

    pub fn roles(&self) -> &Roles {
        &self.roles
    }

    pub fn relayers(&self) -> &BTreeSet<EthAddress> {
        self.roles.relayers()
    }

    pub fn quorum(&self) -> u64 {
        self.quorum
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn executions(&self) -> &ExecutionRecord {
        &self.executions
    }

    pub fn was_batch_finished(&self, nonce: BatchNonce) -> bool {
        self.executions.was_batch_finished(nonce)
    }

    pub fn was_batch_executed(&self, nonce: BatchNonce) -> bool {
        self.executions.was_batch_executed(nonce)
    }

    // ---------------------------------------------------------------------
    // Administration
    // ---------------------------------------------------------------------

    pub(crate) fn add_relayer(
        &mut self,
        ctx: &mut CallContext,
        relayer: EthAddress,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        ensure_non_zero(&relayer, "relayer")?;
        if self.roles.has_relayer_capability(&relayer) {
            return Err(BridgeError::InvalidState(format!(
                "{relayer:?} is already a relayer"
            )));
        }
        ensure_valid_quorum(self.quorum, self.roles.relayer_count() + 1)?;
        self.roles.insert_relayer(relayer);
        info!(?relayer, "Relayer added");
        ctx.emit(BridgeEvent::RelayerAdded { relayer });
        Ok(())
    }

    pub(crate) fn remove_relayer(
        &mut self,
        ctx: &mut CallContext,
        relayer: EthAddress,
    ) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        if !self.roles.has_relayer_capability(&relayer) {
            return Err(BridgeError::InvalidState(format!(
                "{relayer:?} is not a relayer"
            )));
        }
        ensure_valid_quorum(self.quorum, self.roles.relayer_count() - 1)?;
        self.roles.remove_relayer(&relayer);
        info!(?relayer, "Relayer removed");
        ctx.emit(BridgeEvent::RelayerRemoved { relayer });
        Ok(())
    }

    pub(crate) fn set_quorum(&mut self, ctx: &mut CallContext, quorum: u64) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        ensure_valid_quorum(quorum, self.roles.relayer_count())?;
        self.quorum = quorum;
        info!(quorum, "Quorum changed");
        ctx.emit(BridgeEvent::QuorumChanged { quorum });
        Ok(())
    }

    pub(crate) fn pause(&mut self, ctx: &mut CallContext) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        if !self.paused {
            self.paused = true;
            info!("Bridge paused");
            ctx.emit(BridgeEvent::Paused { by: ctx.sender() });
        }
        Ok(())
    }

    pub(crate) fn unpause(&mut self, ctx: &mut CallContext) -> BridgeResult<()> {
        self.roles.ensure_admin(&ctx.sender())?;
        if self.paused {
            self.paused = false;
            info!("Bridge unpaused");
            ctx.emit(BridgeEvent::Unpaused { by: ctx.sender() });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Settlement
    // ---------------------------------------------------------------------

    fn ensure_can_settle(&self, ctx: &CallContext) -> BridgeResult<()> {
        self.roles.ensure_relayer(&ctx.sender())?;
        if self.paused {
            return Err(BridgeError::BridgePaused);
        }
        Ok(())
    }

    /// Settles the Ledger's current pending batch. `statuses[i]` becomes the
    /// final status of the batch's i-th deposit.
    pub(crate) fn finish_current_pending_batch(
        &mut self,
        ctx: &mut CallContext,
        ledger: &mut Ledger,
        batch_nonce: BatchNonce,
        statuses: &[DepositStatus],
        signatures: &[Vec<u8>],
    ) -> BridgeResult<()> {
        self.ensure_can_settle(ctx)?;
        if self.executions.was_batch_finished(batch_nonce) {
            return Err(BridgeError::ReplayRejected(batch_nonce));
        }
        let batch = ledger
            .get_next_pending_batch(ctx.timestamp())
            .ok_or_else(|| BridgeError::InvalidState("no batch is ready for settlement".into()))?;
        if batch.nonce != batch_nonce {
            return Err(BridgeError::InvalidState(format!(
                "batch {batch_nonce} is not the current pending batch {}",
                batch.nonce
            )));
        }
        if statuses.len() != batch.deposits.len() {
            return Err(BridgeError::PolicyViolation(format!(
                "{} statuses given for a batch of {} deposits",
                statuses.len(),
                batch.deposits.len()
            )));
        }
        if let Some(status) = statuses.iter().find(|status| !status.is_terminal()) {
            return Err(BridgeError::InvalidState(format!(
                "{status} is not a final deposit status"
            )));
        }
        if let Some((deposit, status)) = batch
            .deposits
            .iter()
            .zip(statuses)
            .find(|(deposit, status)| !deposit.status.is_open() && deposit.status != **status)
        {
            return Err(BridgeError::InvalidState(format!(
                "deposit {} was already settled as {}, not {status}",
                deposit.nonce, deposit.status
            )));
        }

        let hash = FinishBatchMessage {
            batch_nonce,
            statuses,
        }
        .message_hash();
        let signers = verify_quorum(&hash, signatures, &self.roles, self.quorum, &self.metrics)?;

        for (deposit, status) in batch.deposits.iter().zip(statuses) {
            if !deposit.status.is_open() {
                // settled earlier through the single-deposit path
                continue;
            }
            let nonce = ctx.call_as(self.address, |ctx| {
                ledger.finalize_next_pending_deposit(ctx, *status)
            })?;
            if nonce != deposit.nonce {
                return Err(BridgeError::InvalidState(format!(
                    "finalized deposit {nonce} out of order, expected {}",
                    deposit.nonce
                )));
            }
        }
        self.executions.record_finished_batch(batch_nonce);

        info!(
            batch_nonce,
            deposits = batch.deposits.len(),
            signers = signers.len(),
            "Finished pending batch"
        );
        self.metrics.batches_finished.inc();
        self.metrics
            .finished_batch_size
            .observe(batch.deposits.len() as f64);
        Ok(())
    }

    /// Settles the single oldest pending deposit.
    pub(crate) fn finish_current_pending_transaction(
        &mut self,
        ctx: &mut CallContext,
        ledger: &mut Ledger,
        deposit_nonce: DepositNonce,
        status: DepositStatus,
        signatures: &[Vec<u8>],
    ) -> BridgeResult<()> {
        self.ensure_can_settle(ctx)?;
        if self.executions.was_deposit_finished(deposit_nonce) {
            return Err(BridgeError::ReplayRejected(deposit_nonce));
        }
        let pending = ledger
            .get_next_pending_deposit()
            .map(|deposit| deposit.nonce)
            .ok_or_else(|| BridgeError::InvalidState("no pending deposit".into()))?;
        if pending != deposit_nonce {
            return Err(BridgeError::InvalidState(format!(
                "deposit {deposit_nonce} is not the current pending deposit {pending}"
            )));
        }
        if !status.is_terminal() {
            return Err(BridgeError::InvalidState(format!(
                "{status} is not a final deposit status"
            )));
        }

        let hash = FinishTransactionMessage {
            deposit_nonce,
            status,
        }
        .message_hash();
        verify_quorum(&hash, signatures, &self.roles, self.quorum, &self.metrics)?;

        ctx.call_as(self.address, |ctx| {
            ledger.finalize_next_pending_deposit(ctx, status)
        })?;
        self.executions.record_finished_deposit(deposit_nonce);

        info!(deposit_nonce, %status, "Finished pending transaction");
        self.metrics.transactions_finished.inc();
        ctx.emit(BridgeEvent::FinishedTransaction {
            nonce: deposit_nonce,
            status,
        });
        Ok(())
    }

    /// Releases custody funds for an inbound batch: `amounts[i]` of
    /// `tokens[i]` goes to `recipients[i]`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn execute_transfer<T: TokenContract>(
        &mut self,
        ctx: &mut CallContext,
        ledger: &mut Ledger,
        token_contract: &mut T,
        tokens: &[EthAddress],
        recipients: &[EthAddress],
        amounts: &[U256],
        batch_nonce: BatchNonce,
        signatures: &[Vec<u8>],
    ) -> BridgeResult<()> {
        self.ensure_can_settle(ctx)?;
        if tokens.len() != recipients.len() || tokens.len() != amounts.len() {
            return Err(BridgeError::PolicyViolation(format!(
                "mismatched transfer arrays: {} tokens, {} recipients, {} amounts",
                tokens.len(),
                recipients.len(),
                amounts.len()
            )));
        }
        if self.executions.was_batch_executed(batch_nonce) {
            warn!(batch_nonce, "Transfer batch was already executed");
            return Err(BridgeError::ReplayRejected(batch_nonce));
        }

        let hash = ExecuteTransferMessage {
            recipients,
            tokens,
            amounts,
            batch_nonce,
        }
        .message_hash();
        verify_quorum(&hash, signatures, &self.roles, self.quorum, &self.metrics)?;

        for ((token, recipient), amount) in tokens.iter().zip(recipients).zip(amounts) {
            ctx.call_as(self.address, |ctx| {
                ledger.transfer_out(ctx, &mut *token_contract, *token, *amount, *recipient)
            })?;
        }
        self.executions.record_executed_transfer(batch_nonce);

        info!(batch_nonce, transfers = tokens.len(), "Executed transfer batch");
        self.metrics.transfers_executed.inc();
        self.metrics.tokens_released.inc_by(tokens.len() as u64);
        ctx.emit(BridgeEvent::TransferExecuted { batch_nonce });
        Ok(())
    }
}

impl Journaled for Bridge {
    fn begin(&mut self) {
        self.saved_header = Some((self.roles.clone(), self.quorum, self.paused));
        self.executions.begin();
    }

    fn commit(&mut self) {
        self.saved_header = None;
        self.executions.commit();
    }

    fn rollback(&mut self) {
        if let Some((roles, quorum, paused)) = self.saved_header.take() {
            self.roles = roles;
            self.quorum = quorum;
            self.paused = paused;
        }
        self.executions.rollback();
    }
}

impl CapabilityCheck for Bridge {
    fn has_admin_capability(&self, caller: &EthAddress) -> bool {
        self.roles.has_admin_capability(caller)
    }

    fn has_relayer_capability(&self, caller: &EthAddress) -> bool {
        self.roles.has_relayer_capability(caller)
    }
}
