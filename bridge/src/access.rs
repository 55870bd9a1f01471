// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Capability checks guarding every state-changing entry point.

use crate::error::{BridgeError, BridgeResult};
use ethers::types::Address as EthAddress;
use std::collections::BTreeSet;

/// The two independent capabilities an entry point may require.
pub trait CapabilityCheck {
    fn has_admin_capability(&self, caller: &EthAddress) -> bool;

    fn has_relayer_capability(&self, caller: &EthAddress) -> bool;

    fn ensure_admin(&self, caller: &EthAddress) -> BridgeResult<()> {
        if self.has_admin_capability(caller) {
            Ok(())
        } else {
            Err(BridgeError::AccessDenied(format!(
                "{caller:?} does not hold the admin capability"
            )))
        }
    }

    fn ensure_relayer(&self, caller: &EthAddress) -> BridgeResult<()> {
        if self.has_relayer_capability(caller) {
            Ok(())
        } else {
            Err(BridgeError::AccessDenied(format!(
                "{caller:?} does not hold the relayer capability"
            )))
        }
    }
}

/// Admin and relayer membership. The Ledger only ever populates admins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Roles {
    admins: BTreeSet<EthAddress>,
    relayers: BTreeSet<EthAddress>,
}

impl Roles {
    pub fn new(admins: impl IntoIterator<Item = EthAddress>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            relayers: BTreeSet::new(),
        }
    }

    pub fn admins(&self) -> &BTreeSet<EthAddress> {
        &self.admins
    }

    pub fn relayers(&self) -> &BTreeSet<EthAddress> {
        &self.relayers
    }

    pub fn relayer_count(&self) -> u64 {
        self.relayers.len() as u64
    }

    /// Returns false if `relayer` was already present.
    pub(crate) fn insert_relayer(&mut self, relayer: EthAddress) -> bool {
        self.relayers.insert(relayer)
    }

    /// Returns false if `relayer` was not present.
    pub(crate) fn remove_relayer(&mut self, relayer: &EthAddress) -> bool {
        self.relayers.remove(relayer)
    }
}

impl CapabilityCheck for Roles {
    fn has_admin_capability(&self, caller: &EthAddress) -> bool {
        self.admins.contains(caller)
    }

    fn has_relayer_capability(&self, caller: &EthAddress) -> bool {
        self.relayers.contains(caller)
    }
}
