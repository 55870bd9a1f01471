// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A lock-and-release asset bridge.
//!
//! The [`ledger::Ledger`] takes custody of whitelisted tokens and groups
//! deposits into batches. The [`bridge::Bridge`] settles those batches, and
//! releases custody funds for inbound transfers, once a quorum of distinct
//! relayers has signed off. [`runtime::BridgeRuntime`] hosts both and runs
//! every call as an all-or-nothing unit of work.

pub mod access;
pub mod batch;
pub mod bridge;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod events;
pub mod execution;
pub mod journal;
pub mod ledger;
pub mod metrics;
pub mod quorum;
pub mod runtime;
pub mod token;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;
