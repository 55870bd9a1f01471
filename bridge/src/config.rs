// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::batch::{
    BatchPolicy, DEFAULT_BATCH_SETTLE_WINDOW_SECS, DEFAULT_BATCH_SIZE,
    DEFAULT_BATCH_TIME_LIMIT_SECS,
};
use crate::bridge::Bridge;
use crate::journal::Journaled;
use crate::ledger::Ledger;
use crate::metrics::BridgeMetrics;
use crate::quorum::ensure_valid_quorum;
use crate::runtime::BridgeRuntime;
use crate::token::TokenContract;
use crate::types::{Timestamp, TokenLimits};
use anyhow::{anyhow, bail};
use ethers::types::{Address as EthAddress, U256};
use lockbox_bridge_config::Config;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TokenConfig {
    pub address: EthAddress,
    // Smallest accepted deposit, 1 if absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_deposit: Option<u128>,
    // Largest accepted deposit, unbounded if absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_deposit: Option<u128>,
}

impl TokenConfig {
    pub fn limits(&self) -> TokenLimits {
        let defaults = TokenLimits::default();
        TokenLimits {
            min: self.min_deposit.map(U256::from).unwrap_or(defaults.min),
            max: self.max_deposit.map(U256::from),
        }
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    // Holders of the admin capability on both the Ledger and the Bridge.
    pub admins: Vec<EthAddress>,
    // Custody account of the Ledger.
    pub ledger_address: EthAddress,
    // Identity the Bridge calls the Ledger with; bound as its authority.
    pub bridge_address: EthAddress,
    pub relayers: Vec<EthAddress>,
    pub quorum: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u16,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_batch_time_limit")]
    pub batch_time_limit: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_batch_settle_window")]
    pub batch_settle_window: Duration,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

fn default_batch_size() -> u16 {
    DEFAULT_BATCH_SIZE
}

fn default_batch_time_limit() -> Duration {
    Duration::from_secs(DEFAULT_BATCH_TIME_LIMIT_SECS)
}

fn default_batch_settle_window() -> Duration {
    Duration::from_secs(DEFAULT_BATCH_SETTLE_WINDOW_SECS)
}

impl Config for BridgeConfig {}

impl BridgeConfig {
    pub fn batch_policy(&self) -> anyhow::Result<BatchPolicy> {
        Ok(BatchPolicy::new(
            self.batch_size,
            self.batch_time_limit.as_secs(),
            self.batch_settle_window.as_secs(),
        )?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        info!("Starting config validation");
        if self.admins.is_empty() {
            bail!("At least one admin is required");
        }
        let named = [
            ("ledger-address", self.ledger_address),
            ("bridge-address", self.bridge_address),
        ];
        for (name, address) in named {
            if address.is_zero() {
                bail!("{name} must not be the zero address");
            }
        }
        if self.ledger_address == self.bridge_address {
            bail!("ledger-address and bridge-address must differ");
        }

        let mut relayers = BTreeSet::new();
        for relayer in &self.relayers {
            if relayer.is_zero() || !relayers.insert(relayer) {
                bail!("Invalid or duplicated relayer {relayer:?}");
            }
        }
        ensure_valid_quorum(self.quorum, relayers.len() as u64)
            .map_err(|e| anyhow!("Invalid quorum: {e}"))?;
        info!(
            relayers = relayers.len(),
            quorum = self.quorum,
            "Relayer set validated"
        );

        self.batch_policy()?;

        let mut tokens = BTreeSet::new();
        for token in &self.tokens {
            if token.address.is_zero() || !tokens.insert(token.address) {
                bail!("Invalid or duplicated token {:?}", token.address);
            }
            let limits = token.limits();
            if limits.max.is_some_and(|max| max < limits.min) {
                bail!("Token {:?} has max-deposit below min-deposit", token.address);
            }
        }
        info!("Config validation complete");
        Ok(())
    }

    /// Builds a runtime from this config: relayers and quorum installed, the
    /// Bridge bound as the Ledger's authority, tokens whitelisted with their
    /// limits and the pause switches set. The setup calls are made by the
    /// first admin at `now`.
    pub fn build_runtime<T: TokenContract + Journaled>(
        &self,
        tokens: T,
        metrics: Arc<BridgeMetrics>,
        now: Timestamp,
    ) -> anyhow::Result<BridgeRuntime<T>> {
        self.validate()?;
        let admin = self.admins[0];
        let ledger = Ledger::new(
            self.ledger_address,
            self.admins.iter().copied(),
            self.batch_policy()?,
        );
        let bridge = Bridge::new(
            self.bridge_address,
            self.admins.iter().copied(),
            self.relayers.iter().copied(),
            self.quorum,
            metrics.clone(),
        )?;
        let mut runtime = BridgeRuntime::new(ledger, bridge, tokens, metrics);
        runtime.set_bridge_authority(admin, now, self.bridge_address)?;
        for token in &self.tokens {
            runtime.whitelist(admin, now, token.address)?;
            if token.min_deposit.is_some() || token.max_deposit.is_some() {
                runtime.set_token_limits(admin, now, token.address, token.limits())?;
            }
        }
        if self.paused {
            runtime.pause_ledger(admin, now)?;
            runtime.pause_bridge(admin, now)?;
        }
        info!(
            ledger = ?self.ledger_address,
            bridge = ?self.bridge_address,
            tokens = self.tokens.len(),
            "Bridge runtime ready"
        );
        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_for_testing, test_admin, test_relayers, test_token};
    use crate::token::InMemoryTokenContract;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            admins: vec![test_admin()],
            ledger_address: EthAddress::repeat_byte(0x1e),
            bridge_address: EthAddress::repeat_byte(0xb1),
            relayers: test_relayers(4).iter().map(|r| r.address).collect(),
            quorum: 3,
            batch_size: 10,
            batch_time_limit: Duration::from_secs(600),
            batch_settle_window: Duration::from_secs(300),
            paused: false,
            tokens: vec![TokenConfig {
                address: test_token(),
                min_deposit: Some(10),
                max_deposit: None,
            }],
        }
    }

    #[test]
    fn test_yaml_round_trip_and_defaults() {
        init_for_testing();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        let config = test_config();
        config.save(&path).unwrap();
        assert_eq!(BridgeConfig::load(&path).unwrap(), config);

        let yaml = r#"
admins: ["0xadadadadadadadadadadadadadadadadadadadad"]
ledger-address: "0x1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e1e"
bridge-address: "0xb1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1b1"
relayers: []
quorum: 3
batch-time-limit: 120
"#;
        let config: BridgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.batch_time_limit, Duration::from_secs(120));
        assert_eq!(
            config.batch_settle_window,
            Duration::from_secs(DEFAULT_BATCH_SETTLE_WINDOW_SECS)
        );
        assert!(!config.paused);
        assert!(config.tokens.is_empty());
        // no relayers cannot reach a quorum of 3
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        init_for_testing();
        test_config().validate().unwrap();

        let mut config = test_config();
        config.admins.clear();
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.bridge_address = config.ledger_address;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.relayers.push(config.relayers[0]);
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.quorum = 2;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.tokens[0].max_deposit = Some(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_runtime_wires_components() {
        init_for_testing();
        let mut config = test_config();
        config.paused = true;
        let runtime = config
            .build_runtime(
                InMemoryTokenContract::new(),
                Arc::new(BridgeMetrics::new_for_testing()),
                1_000,
            )
            .unwrap();

        let ledger = runtime.ledger();
        assert_eq!(ledger.bridge_authority(), Some(config.bridge_address));
        assert!(ledger.is_token_whitelisted(&test_token()));
        assert_eq!(ledger.token_limits(&test_token()).unwrap().min, U256::from(10));
        assert_eq!(ledger.policy().settle_window(), 300);
        assert!(ledger.is_paused());
        assert!(runtime.bridge().is_paused());
        assert_eq!(runtime.quorum(), 3);
        assert_eq!(runtime.relayers().len(), 4);
        assert_eq!(runtime.metrics().current_relayers.get(), 4);
    }
}
