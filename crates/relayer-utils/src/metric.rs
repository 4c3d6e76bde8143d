// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use prometheus::core::{AtomicF64, GenericCounter};
use prometheus::{
    register_counter_with_registry, Encoder, Registry, TextEncoder,
};

/// A struct definition for collecting metrics in the relayer.
///
/// Counters are reference counted, so clones of `Metrics` update the same
/// values.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Proposals appended to the store by the watchers.
    pub proposals_ingested: GenericCounter<AtomicF64>,
    /// Events seen again after they were already stored.
    pub duplicate_ingestions: GenericCounter<AtomicF64>,
    /// Suggest transactions sent by the signers.
    pub proposals_submitted: GenericCounter<AtomicF64>,
    /// Proposals whose suggest transaction got a receipt.
    pub proposals_signed: GenericCounter<AtomicF64>,
    /// Pending proposals whose transaction vanished and went back to unsigned.
    pub proposals_reverted: GenericCounter<AtomicF64>,
    /// Logs that could not be decoded.
    pub malformed_logs: GenericCounter<AtomicF64>,
    /// Ticks dropped because the previous one was still running.
    pub skipped_ticks: GenericCounter<AtomicF64>,
    /// Ticks abandoned after exceeding their time budget.
    pub timed_out_ticks: GenericCounter<AtomicF64>,
}

impl Metrics {
    /// Instantiates the counters and registers them in a registry owned by
    /// this instance.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bridge".into()), None)?;

        let proposals_ingested = register_counter_with_registry!(
            "proposals_ingested",
            "The total number of proposals appended by the chain watchers",
            registry
        )?;

        let duplicate_ingestions = register_counter_with_registry!(
            "duplicate_ingestions",
            "The total number of events that were already stored as proposals",
            registry
        )?;

        let proposals_submitted = register_counter_with_registry!(
            "proposals_submitted",
            "The total number of suggest transactions sent",
            registry
        )?;

        let proposals_signed = register_counter_with_registry!(
            "proposals_signed",
            "The total number of proposals confirmed on chain",
            registry
        )?;

        let proposals_reverted = register_counter_with_registry!(
            "proposals_reverted",
            "The total number of pending proposals reverted to unsigned",
            registry
        )?;

        let malformed_logs = register_counter_with_registry!(
            "malformed_logs",
            "The total number of logs that could not be decoded",
            registry
        )?;

        let skipped_ticks = register_counter_with_registry!(
            "skipped_ticks",
            "How many scheduled ticks were skipped because a worker was busy",
            registry
        )?;

        let timed_out_ticks = register_counter_with_registry!(
            "timed_out_ticks",
            "How many ticks were abandoned after their time budget",
            registry
        )?;

        Ok(Self {
            registry,
            proposals_ingested,
            duplicate_ingestions,
            proposals_submitted,
            proposals_signed,
            proposals_reverted,
            malformed_logs,
            skipped_ticks,
            timed_out_ticks,
        })
    }

    /// Gathers the whole relayer metrics in the prometheus text format.
    pub fn gather_metrics(&self) -> Result<String, GatherMetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Errors while rendering the metrics.
#[derive(Debug, thiserror::Error)]
pub enum GatherMetricsError {
    /// Encoding failed.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// The encoder produced invalid UTF-8.
    #[error(transparent)]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}
