// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host runtime for the Ledger and the Bridge.
//!
//! Calls are serialized through `&mut self`. Each entry point runs as one
//! unit of work: ledger, bridge and token state journal their writes and
//! undo them if the call fails, and the events it emitted are published only
//! when it commits.

use crate::bridge::Bridge;
use crate::error::BridgeResult;
use crate::events::BridgeEvent;
use crate::journal::Journaled;
use crate::ledger::Ledger;
use crate::metrics::BridgeMetrics;
use crate::token::TokenContract;
use crate::types::{
    Batch, BatchNonce, CallContext, Deposit, DepositNonce, DepositStatus, Timestamp, TokenLimits,
};
use ethers::types::{Address as EthAddress, U256};
use std::sync::Arc;
use tracing::{debug, warn};

/// Owner of the Ledger, the Bridge and the token contract, and the only
/// way to change their state. Calling a component directly does not compile
/// outside this crate:
///
/// ```compile_fail
/// use lockbox_bridge::bridge::Bridge;
/// use lockbox_bridge::types::CallContext;
///
/// fn pause(bridge: &mut Bridge, ctx: &mut CallContext) {
///     let _ = bridge.pause(ctx);
/// }
/// ```
pub struct BridgeRuntime<T> {
    ledger: Ledger,
    bridge: Bridge,
    tokens: T,
    events: Vec<BridgeEvent>,
    metrics: Arc<BridgeMetrics>,
}

impl<T: TokenContract + Journaled> BridgeRuntime<T> {
    pub fn new(ledger: Ledger, bridge: Bridge, tokens: T, metrics: Arc<BridgeMetrics>) -> Self {
        let runtime = Self {
            ledger,
            bridge,
            tokens,
            events: vec![],
            metrics,
        };
        runtime.refresh_gauges();
        runtime
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn tokens(&self) -> &T {
        &self.tokens
    }

    /// The token contracts live outside the bridge; holders mint and approve
    /// through them directly.
    pub fn tokens_mut(&mut self) -> &mut T {
        &mut self.tokens
    }

    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Every event published by committed calls, oldest first.
    pub fn events(&self) -> &[BridgeEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<BridgeEvent> {
        std::mem::take(&mut self.events)
    }

    fn atomically<R>(
        &mut self,
        entry_point: &'static str,
        caller: EthAddress,
        now: Timestamp,
        f: impl FnOnce(&mut Ledger, &mut Bridge, &mut T, &mut CallContext) -> BridgeResult<R>,
    ) -> BridgeResult<R> {
        self.metrics
            .calls
            .with_label_values(&[entry_point])
            .inc();
        self.ledger.begin();
        self.bridge.begin();
        self.tokens.begin();
        let mut ctx = CallContext::new(caller, now);
        match f(&mut self.ledger, &mut self.bridge, &mut self.tokens, &mut ctx) {
            Ok(result) => {
                self.ledger.commit();
                self.bridge.commit();
                self.tokens.commit();
                self.publish(ctx.into_events());
                self.refresh_gauges();
                Ok(result)
            }
            Err(err) => {
                self.ledger.rollback();
                self.bridge.rollback();
                self.tokens.rollback();
                warn!(entry_point, ?caller, "Call aborted, state restored: {err}");
                self.metrics
                    .err_calls
                    .with_label_values(&[err.error_type()])
                    .inc();
                Err(err)
            }
        }
    }

    fn publish(&mut self, events: Vec<BridgeEvent>) {
        for event in events {
            match &event {
                BridgeEvent::Deposited { .. } => self.metrics.deposits.inc(),
                BridgeEvent::UpdatedDepositStatus { status, .. } => self
                    .metrics
                    .deposit_status_updates
                    .with_label_values(&[&status.to_string()])
                    .inc(),
                _ => {}
            }
            debug!(?event, "Published event");
            self.events.push(event);
        }
    }

    fn refresh_gauges(&self) {
        self.metrics.current_quorum.set(self.bridge.quorum() as i64);
        self.metrics
            .current_relayers
            .set(self.bridge.roles().relayer_count() as i64);
        self.metrics
            .pending_deposits
            .set(self.ledger.pending_deposits_count() as i64);
    }

    // ---------------------------------------------------------------------
    // Ledger entry points
    // ---------------------------------------------------------------------

    pub fn whitelist(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        token: EthAddress,
    ) -> BridgeResult<()> {
        self.atomically("whitelist", caller, now, |ledger, _, _, ctx| {
            ledger.whitelist(ctx, token)
        })
    }

    pub fn remove_from_whitelist(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        token: EthAddress,
    ) -> BridgeResult<()> {
        self.atomically("remove_from_whitelist", caller, now, |ledger, _, _, ctx| {
            ledger.remove_from_whitelist(ctx, token)
        })
    }

    pub fn set_token_limits(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        token: EthAddress,
        limits: TokenLimits,
    ) -> BridgeResult<()> {
        self.atomically("set_token_limits", caller, now, |ledger, _, _, ctx| {
            ledger.set_token_limits(ctx, token, limits)
        })
    }

    pub fn set_bridge_authority(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        authority: EthAddress,
    ) -> BridgeResult<()> {
        self.atomically("set_bridge_authority", caller, now, |ledger, _, _, ctx| {
            ledger.set_bridge_authority(ctx, authority)
        })
    }

    pub fn set_batch_size(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        batch_size: u16,
    ) -> BridgeResult<()> {
        self.atomically("set_batch_size", caller, now, |ledger, _, _, ctx| {
            ledger.set_batch_size(ctx, batch_size)
        })
    }

    pub fn set_batch_time_limit(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        time_limit: Timestamp,
    ) -> BridgeResult<()> {
        self.atomically("set_batch_time_limit", caller, now, |ledger, _, _, ctx| {
            ledger.set_batch_time_limit(ctx, time_limit)
        })
    }

    pub fn set_batch_settle_window(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        settle_window: Timestamp,
    ) -> BridgeResult<()> {
        self.atomically("set_batch_settle_window", caller, now, |ledger, _, _, ctx| {
            ledger.set_batch_settle_window(ctx, settle_window)
        })
    }

    pub fn pause_ledger(&mut self, caller: EthAddress, now: Timestamp) -> BridgeResult<()> {
        self.atomically("pause_ledger", caller, now, |ledger, _, _, ctx| {
            ledger.pause(ctx)
        })
    }

    pub fn unpause_ledger(&mut self, caller: EthAddress, now: Timestamp) -> BridgeResult<()> {
        self.atomically("unpause_ledger", caller, now, |ledger, _, _, ctx| {
            ledger.unpause(ctx)
        })
    }

    pub fn deposit(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        token: EthAddress,
        amount: U256,
        recipient: Vec<u8>,
    ) -> BridgeResult<DepositNonce> {
        self.atomically("deposit", caller, now, |ledger, _, tokens, ctx| {
            ledger.deposit(ctx, tokens, token, amount, recipient)
        })
    }

    // ---------------------------------------------------------------------
    // Bridge entry points
    // ---------------------------------------------------------------------

    pub fn add_relayer(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        relayer: EthAddress,
    ) -> BridgeResult<()> {
        self.atomically("add_relayer", caller, now, |_, bridge, _, ctx| {
            bridge.add_relayer(ctx, relayer)
        })
    }

    pub fn remove_relayer(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        relayer: EthAddress,
    ) -> BridgeResult<()> {
        self.atomically("remove_relayer", caller, now, |_, bridge, _, ctx| {
            bridge.remove_relayer(ctx, relayer)
        })
    }

    pub fn set_quorum(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        quorum: u64,
    ) -> BridgeResult<()> {
        self.atomically("set_quorum", caller, now, |_, bridge, _, ctx| {
            bridge.set_quorum(ctx, quorum)
        })
    }

    pub fn pause_bridge(&mut self, caller: EthAddress, now: Timestamp) -> BridgeResult<()> {
        self.atomically("pause_bridge", caller, now, |_, bridge, _, ctx| {
            bridge.pause(ctx)
        })
    }

    pub fn unpause_bridge(&mut self, caller: EthAddress, now: Timestamp) -> BridgeResult<()> {
        self.atomically("unpause_bridge", caller, now, |_, bridge, _, ctx| {
            bridge.unpause(ctx)
        })
    }

    pub fn finish_current_pending_batch(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        batch_nonce: BatchNonce,
        statuses: &[DepositStatus],
        signatures: &[Vec<u8>],
    ) -> BridgeResult<()> {
        self.atomically(
            "finish_current_pending_batch",
            caller,
            now,
            |ledger, bridge, _, ctx| {
                bridge.finish_current_pending_batch(ctx, ledger, batch_nonce, statuses, signatures)
            },
        )
    }

    pub fn finish_current_pending_transaction(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        deposit_nonce: DepositNonce,
        status: DepositStatus,
        signatures: &[Vec<u8>],
    ) -> BridgeResult<()> {
        self.atomically(
            "finish_current_pending_transaction",
            caller,
            now,
            |ledger, bridge, _, ctx| {
                bridge.finish_current_pending_transaction(
                    ctx,
                    ledger,
                    deposit_nonce,
                    status,
                    signatures,
                )
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn execute_transfer(
        &mut self,
        caller: EthAddress,
        now: Timestamp,
        tokens: &[EthAddress],
        recipients: &[EthAddress],
        amounts: &[U256],
        batch_nonce: BatchNonce,
        signatures: &[Vec<u8>],
    ) -> BridgeResult<()> {
        self.atomically(
            "execute_transfer",
            caller,
            now,
            |ledger, bridge, token_contract, ctx| {
                bridge.execute_transfer(
                    ctx,
                    ledger,
                    token_contract,
                    tokens,
                    recipients,
                    amounts,
                    batch_nonce,
                    signatures,
                )
            },
        )
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn get_next_pending_batch(&self, now: Timestamp) -> Option<Batch> {
        self.ledger.get_next_pending_batch(now)
    }

    pub fn get_next_pending_deposit(&self) -> Option<&Deposit> {
        self.ledger.get_next_pending_deposit()
    }

    pub fn get_deposit(&self, nonce: DepositNonce) -> Option<&Deposit> {
        self.ledger.get_deposit(nonce)
    }

    pub fn get_batch(&self, nonce: BatchNonce) -> Option<Batch> {
        self.ledger.get_batch(nonce)
    }

    pub fn was_batch_finished(&self, nonce: BatchNonce) -> bool {
        self.bridge.was_batch_finished(nonce)
    }

    pub fn was_batch_executed(&self, nonce: BatchNonce) -> bool {
        self.bridge.was_batch_executed(nonce)
    }

    pub fn quorum(&self) -> u64 {
        self.bridge.quorum()
    }

    pub fn relayers(&self) -> Vec<EthAddress> {
        self.bridge.relayers().iter().copied().collect()
    }
}
