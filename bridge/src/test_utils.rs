// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::batch::BatchPolicy;
use crate::bridge::Bridge;
use crate::crypto::{sign_message_hash, to_eth_address, RelayerSigningKey};
use crate::ledger::Ledger;
use crate::metrics::BridgeMetrics;
use crate::runtime::BridgeRuntime;
use crate::token::{InMemoryTokenContract, TokenContract};
use crate::types::Timestamp;
use ethers::types::{Address as EthAddress, H256, U256};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const TEST_START_TIME: Timestamp = 1_700_000_000;

pub fn init_for_testing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_admin() -> EthAddress {
    EthAddress::repeat_byte(0xad)
}

pub fn test_ledger_address() -> EthAddress {
    EthAddress::repeat_byte(0x1e)
}

pub fn test_bridge_address() -> EthAddress {
    EthAddress::repeat_byte(0xb1)
}

pub fn test_token() -> EthAddress {
    EthAddress::repeat_byte(0x70)
}

pub fn test_depositor() -> EthAddress {
    EthAddress::repeat_byte(0xde)
}

pub struct TestRelayer {
    pub key: RelayerSigningKey,
    pub address: EthAddress,
}

impl TestRelayer {
    /// Signature with the `27/28` recovery byte.
    pub fn sign(&self, hash: &H256) -> Vec<u8> {
        sign_message_hash(&self.key, hash).unwrap()
    }

    /// Signature with the raw `0/1` recovery byte.
    pub fn sign_raw(&self, hash: &H256) -> Vec<u8> {
        let mut signature = self.sign(hash);
        signature[64] -= 27;
        signature
    }
}

/// Deterministic relayer keys; the same index always yields the same relayer.
pub fn test_relayers(count: usize) -> Vec<TestRelayer> {
    (0..count)
        .map(|i| {
            let key = RelayerSigningKey::from_slice(&[i as u8 + 1; 32]).unwrap();
            let address = to_eth_address(key.verifying_key());
            TestRelayer { key, address }
        })
        .collect()
}

pub fn sign_by(relayers: &[TestRelayer], hash: &H256) -> Vec<Vec<u8>> {
    relayers.iter().map(|relayer| relayer.sign(hash)).collect()
}

/// Mints `amount` of the test token to every holder and approves `spender`
/// for all of it.
pub fn funded_tokens(
    holders: &[EthAddress],
    spender: EthAddress,
    amount: u64,
) -> InMemoryTokenContract {
    let mut tokens = InMemoryTokenContract::new();
    for holder in holders {
        tokens.mint(test_token(), *holder, U256::from(amount));
        tokens.approve(test_token(), *holder, spender, U256::from(amount));
    }
    tokens
}

pub struct TestEnv {
    pub runtime: BridgeRuntime<InMemoryTokenContract>,
    pub relayers: Vec<TestRelayer>,
}

impl TestEnv {
    pub fn relayer(&self, index: usize) -> EthAddress {
        self.relayers[index].address
    }

    pub fn deposit(&mut self, now: Timestamp, amount: u64) -> u64 {
        self.runtime
            .deposit(
                test_depositor(),
                now,
                test_token(),
                U256::from(amount),
                b"erd1qqqqqqqqqqqqqpgq".to_vec(),
            )
            .unwrap()
    }
}

/// A runtime with the test token whitelisted, the bridge bound as the
/// Ledger's authority and the depositor funded.
pub fn test_env(relayer_count: usize, quorum: u64, batch_size: u16) -> TestEnv {
    init_for_testing();
    let relayers = test_relayers(relayer_count);
    let metrics = Arc::new(BridgeMetrics::new_for_testing());
    let ledger = Ledger::new(
        test_ledger_address(),
        [test_admin()],
        BatchPolicy::new(batch_size, 600, 600).unwrap(),
    );
    let bridge = Bridge::new(
        test_bridge_address(),
        [test_admin()],
        relayers.iter().map(|r| r.address),
        quorum,
        metrics.clone(),
    )
    .unwrap();
    let tokens = funded_tokens(&[test_depositor()], test_ledger_address(), 1_000_000);
    let mut runtime = BridgeRuntime::new(ledger, bridge, tokens, metrics);
    runtime
        .whitelist(test_admin(), TEST_START_TIME, test_token())
        .unwrap();
    runtime
        .set_bridge_authority(test_admin(), TEST_START_TIME, test_bridge_address())
        .unwrap();
    runtime.drain_events();
    TestEnv { runtime, relayers }
}
