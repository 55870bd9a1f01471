// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Histogram, IntCounter,
    IntCounterVec, IntGauge, Registry,
};

const BATCH_SIZE_BUCKETS: &[f64] = &[1., 2., 5., 10., 20., 30., 40., 50., 75., 100.];

#[derive(Clone, Debug)]
pub struct BridgeMetrics {
    pub(crate) calls: IntCounterVec,
    pub(crate) err_calls: IntCounterVec,

    pub(crate) deposits: IntCounter,
    pub(crate) deposit_status_updates: IntCounterVec,
    pub(crate) batches_finished: IntCounter,
    pub(crate) finished_batch_size: Histogram,
    pub(crate) transactions_finished: IntCounter,
    pub(crate) transfers_executed: IntCounter,
    pub(crate) tokens_released: IntCounter,

    pub(crate) signature_verifications: IntCounterVec,

    pub(crate) current_quorum: IntGauge,
    pub(crate) current_relayers: IntGauge,
    pub(crate) pending_deposits: IntGauge,
}

impl BridgeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            calls: register_int_counter_vec_with_registry!(
                "bridge_calls",
                "Total number of calls into the bridge runtime, by entry point",
                &["entry_point"],
                registry,
            )
            .unwrap(),
            err_calls: register_int_counter_vec_with_registry!(
                "bridge_err_calls",
                "Total number of aborted calls, by error type",
                &["type"],
                registry,
            )
            .unwrap(),
            deposits: register_int_counter_with_registry!(
                "bridge_deposits",
                "Total number of deposits locked into custody",
                registry,
            )
            .unwrap(),
            deposit_status_updates: register_int_counter_vec_with_registry!(
                "bridge_deposit_status_updates",
                "Total number of deposits moved to a final status, by status",
                &["status"],
                registry,
            )
            .unwrap(),
            batches_finished: register_int_counter_with_registry!(
                "bridge_batches_finished",
                "Total number of outbound batches settled by relayer quorum",
                registry,
            )
            .unwrap(),
            finished_batch_size: register_histogram_with_registry!(
                "bridge_finished_batch_size",
                "Number of deposits in each settled batch",
                BATCH_SIZE_BUCKETS.to_vec(),
                registry,
            )
            .unwrap(),
            transactions_finished: register_int_counter_with_registry!(
                "bridge_transactions_finished",
                "Total number of single deposits settled by relayer quorum",
                registry,
            )
            .unwrap(),
            transfers_executed: register_int_counter_with_registry!(
                "bridge_transfers_executed",
                "Total number of inbound batches released from custody",
                registry,
            )
            .unwrap(),
            tokens_released: register_int_counter_with_registry!(
                "bridge_tokens_released",
                "Total number of individual custody releases",
                registry,
            )
            .unwrap(),
            signature_verifications: register_int_counter_vec_with_registry!(
                "bridge_signature_verifications",
                "Total number of relayer signatures checked, by outcome",
                &["outcome"],
                registry,
            )
            .unwrap(),
            current_quorum: register_int_gauge_with_registry!(
                "bridge_current_quorum",
                "Number of distinct relayer signatures currently required",
                registry,
            )
            .unwrap(),
            current_relayers: register_int_gauge_with_registry!(
                "bridge_current_relayers",
                "Number of registered relayers",
                registry,
            )
            .unwrap(),
            pending_deposits: register_int_gauge_with_registry!(
                "bridge_pending_deposits",
                "Number of deposits not yet in a final status",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}
