// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Batch accumulation policy.
//!
//! A batch is ready for settlement once it is full, or once it is old enough
//! *and* has been quiet for the settle window. The quiet period keeps a batch
//! open while deposits that could still be reorganized away keep arriving.

use crate::error::{BridgeError, BridgeResult};
use crate::types::{BatchNonce, DepositNonce, Timestamp};
use serde::{Deserialize, Serialize};

/// Upper bound on deposits per batch, keeping batch reads bounded.
pub const MAX_BATCH_SIZE: u16 = 100;
pub const DEFAULT_BATCH_SIZE: u16 = 10;
pub const DEFAULT_BATCH_TIME_LIMIT_SECS: Timestamp = 10 * 60;
pub const DEFAULT_BATCH_SETTLE_WINDOW_SECS: Timestamp = 10 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPolicy {
    batch_size: u16,
    time_limit: Timestamp,
    settle_window: Timestamp,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            time_limit: DEFAULT_BATCH_TIME_LIMIT_SECS,
            settle_window: DEFAULT_BATCH_SETTLE_WINDOW_SECS,
        }
    }
}

impl BatchPolicy {
    pub fn new(
        batch_size: u16,
        time_limit: Timestamp,
        settle_window: Timestamp,
    ) -> BridgeResult<Self> {
        Self::check_batch_size(batch_size)?;
        Ok(Self {
            batch_size,
            time_limit,
            settle_window,
        })
    }

    pub fn check_batch_size(batch_size: u16) -> BridgeResult<()> {
        if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
            return Err(BridgeError::PolicyViolation(format!(
                "batch size {batch_size} must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        Ok(())
    }

    pub fn batch_size(&self) -> u16 {
        self.batch_size
    }

    pub fn time_limit(&self) -> Timestamp {
        self.time_limit
    }

    pub fn settle_window(&self) -> Timestamp {
        self.settle_window
    }

    pub(crate) fn set_batch_size(&mut self, batch_size: u16) -> BridgeResult<()> {
        Self::check_batch_size(batch_size)?;
        self.batch_size = batch_size;
        Ok(())
    }

    pub(crate) fn set_time_limit(&mut self, time_limit: Timestamp) {
        self.time_limit = time_limit;
    }

    pub(crate) fn set_settle_window(&mut self, settle_window: Timestamp) {
        self.settle_window = settle_window;
    }

    pub fn is_full(&self, batch: &BatchRecord) -> bool {
        batch.deposits.len() >= self.batch_size as usize
    }

    pub fn is_ready(&self, batch: &BatchRecord, now: Timestamp) -> bool {
        if self.is_full(batch) {
            return true;
        }
        let age = now.saturating_sub(batch.created_at);
        let quiet_for = now.saturating_sub(batch.last_updated);
        age >= self.time_limit && quiet_for >= self.settle_window
    }
}

/// Stored form of a batch: deposits are referenced by nonce and live in the
/// Ledger's deposit table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub nonce: BatchNonce,
    pub deposits: Vec<DepositNonce>,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
    // Closed for good: no more appends, whatever the policy says later.
    pub sealed: bool,
    pub finalized: bool,
}

impl BatchRecord {
    pub fn open(nonce: BatchNonce, now: Timestamp) -> Self {
        Self {
            nonce,
            deposits: Vec::new(),
            created_at: now,
            last_updated: now,
            sealed: false,
            finalized: false,
        }
    }

    pub fn push(&mut self, deposit: DepositNonce, now: Timestamp) {
        self.deposits.push(deposit);
        self.last_updated = now;
    }

    pub fn last_deposit(&self) -> Option<DepositNonce> {
        self.deposits.last().copied()
    }

    /// Whether new deposits may still be appended at `now`.
    pub fn accepts_deposits(&self, policy: &BatchPolicy, now: Timestamp) -> bool {
        !self.sealed && !self.finalized && !policy.is_ready(self, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_with(count: u64, created_at: Timestamp, last_updated: Timestamp) -> BatchRecord {
        let mut batch = BatchRecord::open(1, created_at);
        for nonce in 1..=count {
            batch.push(nonce, created_at);
        }
        batch.last_updated = last_updated;
        batch
    }

    #[test]
    fn test_full_batch_is_ready_regardless_of_age() {
        let policy = BatchPolicy::new(3, 600, 600).unwrap();
        let batch = batch_with(3, 1_000, 1_000);
        assert!(policy.is_ready(&batch, 1_000));
        assert!(!batch.accepts_deposits(&policy, 1_000));
    }

    #[test]
    fn test_young_partial_batch_is_not_ready() {
        let policy = BatchPolicy::new(3, 600, 600).unwrap();
        let batch = batch_with(2, 1_000, 1_000);
        for now in [1_000, 1_300, 1_599] {
            assert!(!policy.is_ready(&batch, now), "ready at {now}");
        }
    }

    #[test]
    fn test_old_batch_waits_for_settle_window() {
        let policy = BatchPolicy::new(10, 600, 300).unwrap();
        // created at 1000, last deposit at 1500
        let batch = batch_with(2, 1_000, 1_500);
        // old enough but the last deposit is too recent
        assert!(!policy.is_ready(&batch, 1_700));
        // both conditions hold at 1800
        assert!(policy.is_ready(&batch, 1_800));
    }

    #[test]
    fn test_quiet_batch_still_needs_time_limit() {
        let policy = BatchPolicy::new(10, 600, 60).unwrap();
        let batch = batch_with(1, 1_000, 1_000);
        // quiet for 100s but only 100s old
        assert!(!policy.is_ready(&batch, 1_100));
        assert!(policy.is_ready(&batch, 1_600));
    }

    #[test]
    fn test_clock_going_backwards_is_not_ready() {
        let policy = BatchPolicy::new(10, 600, 600).unwrap();
        let batch = batch_with(1, 1_000, 1_000);
        assert!(!policy.is_ready(&batch, 10));
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(matches!(
            BatchPolicy::new(0, 1, 1).unwrap_err(),
            BridgeError::PolicyViolation(_)
        ));
        assert!(matches!(
            BatchPolicy::new(MAX_BATCH_SIZE + 1, 1, 1).unwrap_err(),
            BridgeError::PolicyViolation(_)
        ));
        let mut policy = BatchPolicy::new(MAX_BATCH_SIZE, 1, 1).unwrap();
        policy.set_batch_size(1).unwrap();
        assert!(policy.set_batch_size(MAX_BATCH_SIZE + 1).is_err());
        assert_eq!(policy.batch_size(), 1);
    }

    #[test]
    fn test_sealed_batch_rejects_deposits() {
        let policy = BatchPolicy::default();
        let mut batch = batch_with(1, 1_000, 1_000);
        assert!(batch.accepts_deposits(&policy, 1_000));
        batch.sealed = true;
        assert!(!batch.accepts_deposits(&policy, 1_000));
    }
}
