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

#![warn(missing_docs)]
//! # Chain Watcher 👀
//!
//! Walks a chain forward in bounded steps, turning every bridge event it
//! finds into an `unsigned` proposal. The next block to scan is kept in the
//! store, so a restarted relayer resumes where it stopped, and proposal ids
//! are derived from the source event, so scanning a range twice stores
//! nothing new.

use std::time::{Duration, Instant};

use ethers::types::{Address, Log};
use parking_lot::Mutex;

use bridge_chain_client::{abi, ChainClient};
use bridge_relayer_store::{
    AppendOutcome, Proposal, ProposalId, ProposalStore, PROPOSAL_INDEX,
    UNSIGNED_TAG,
};
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::{clickable_link, probe, retry, Error};
use bridge_scheduler::{BusyFlag, PeriodicTask, TickStatus};

mod direction;

pub use direction::{Direction, ForeignBridge, HomeBridge};

/// How a watcher walks its chain.
#[derive(Debug, Clone)]
pub struct WatcherSettings {
    /// The contract emitting the watched events.
    pub contract: Address,
    /// First block scanned when no cursor is stored.
    pub from_height: u64,
    /// Upper bound of blocks fetched per tick.
    pub max_blocks_per_step: u64,
    /// Blocks behind the head left alone.
    pub confirmations: u64,
    /// How often the scanned range is reported at INFO.
    pub print_progress_interval: Option<Duration>,
    /// Block explorer of the chain, for clickable links.
    pub explorer: Option<url::Url>,
}

/// Scans one chain for the events of one [`Direction`].
pub struct ChainWatcher<D, C, S> {
    name: String,
    direction: D,
    client: C,
    store: S,
    settings: WatcherSettings,
    metrics: Metrics,
    busy: BusyFlag,
    last_report: Mutex<Instant>,
}

impl<D, C, S> std::fmt::Debug for ChainWatcher<D, C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainWatcher")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<D, C, S> ChainWatcher<D, C, S>
where
    D: Direction,
    C: ChainClient,
    S: ProposalStore,
{
    /// Creates a watcher named `name` in the logs.
    pub fn new(
        name: impl Into<String>,
        direction: D,
        client: C,
        store: S,
        settings: WatcherSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            client,
            store,
            settings,
            metrics,
            busy: BusyFlag::new(),
            last_report: Mutex::new(Instant::now()),
        }
    }

    /// Scans the next confirmed range and stores its proposals.
    ///
    /// The cursor only moves once the logs of the range were fetched and
    /// every one of them was either stored or found malformed. Any other
    /// failure leaves it in place, so the same range is scanned again.
    #[tracing::instrument(skip_all, fields(prefix = %self.direction.prefix()))]
    pub async fn catch_up(&self) -> bridge_relayer_utils::Result<TickStatus> {
        let Some(_guard) = self.busy.try_acquire() else {
            tracing::trace!(watcher = %self.name, "still scanning, skipped");
            return Ok(TickStatus::Skipped);
        };
        let prefix = self.direction.prefix();
        let cursor = self.store.get_cursor(prefix, self.settings.from_height)?;
        let height = self.client.current_height().await?;
        let confirmed = height.saturating_sub(self.settings.confirmations);
        let step = self.settings.max_blocks_per_step.max(1);
        let target = cursor.saturating_add(step - 1).min(confirmed);
        if target < cursor {
            tracing::trace!(cursor, confirmed, "nothing confirmed yet");
            return Ok(TickStatus::Idle);
        }

        let logs = self
            .client
            .logs_in_range(
                cursor,
                target,
                self.settings.contract,
                &self.direction.event_topics(),
            )
            .await?;
        tracing::trace!(from = cursor, to = target, found = logs.len(), "scanned");

        for log in &logs {
            match self.ingest(log).await {
                Ok(_) => {}
                Err(e) if e.is_malformed_event() => {
                    self.metrics.malformed_logs.inc();
                    tracing::warn!(
                        error = %e,
                        tx = ?log.transaction_hash,
                        block = ?log.block_number,
                        "skipping malformed log",
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        from = cursor,
                        to = target,
                        "failed to store a proposal, the range will be scanned again",
                    );
                    return Err(e);
                }
            }
        }

        let next = self.store.set_cursor(prefix, target + 1)?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::TRACE,
            kind = %probe::Kind::Sync,
            %prefix,
            from = cursor,
            to = target,
            next,
            height,
        );
        self.report_progress(cursor, target, confirmed);
        Ok(TickStatus::Worked)
    }

    async fn ingest(&self, log: &Log) -> bridge_relayer_utils::Result<AppendOutcome> {
        let (id, proposal) = self.decode(log)?;
        let prefix = self.direction.prefix();
        let backoff = retry::ConstantWithMaxRetryCount::new(
            Duration::from_millis(100),
            3,
        );
        let append = || {
            let result = self
                .store
                .append_indexed(
                    prefix,
                    id,
                    PROPOSAL_INDEX,
                    &proposal,
                    Some(UNSIGNED_TAG),
                )
                .map_err(backoff::Error::transient);
            std::future::ready(result)
        };
        let outcome = backoff::future::retry(backoff, append).await?;
        let tx = clickable_link::tx_link(
            self.settings.explorer.as_ref(),
            &format!("{:#x}", proposal.hash),
        );
        match outcome {
            AppendOutcome::Appended { sequence } => {
                self.metrics.proposals_ingested.inc();
                tracing::debug!(%prefix, sequence, id = ?id, %tx, "new proposal");
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::DEBUG,
                    kind = %probe::Kind::Store,
                    %prefix,
                    sequence,
                    appended = true,
                );
            }
            AppendOutcome::Duplicate { sequence } => {
                self.metrics.duplicate_ingestions.inc();
                tracing::trace!(%prefix, sequence, %tx, "proposal already stored");
            }
        }
        Ok(outcome)
    }

    fn decode(&self, log: &Log) -> bridge_relayer_utils::Result<(ProposalId, Proposal)> {
        let sender_topic = log
            .topics
            .get(1)
            .ok_or_else(|| Error::MalformedLog("missing sender topic".into()))?;
        let sender = abi::decode_address(sender_topic)?;
        let value = abi::decode_uint(&log.data)?;
        let hash = log
            .transaction_hash
            .ok_or_else(|| Error::MalformedLog("missing transaction hash".into()))?;
        let block = log
            .block_number
            .ok_or_else(|| Error::MalformedLog("missing block number".into()))?
            .as_u64();
        let calldata = self.direction.encode_call(sender, value);
        let id = abi::proposal_id(hash, &calldata);
        Ok((
            id,
            Proposal {
                hash,
                calldata,
                block,
            },
        ))
    }

    fn report_progress(&self, from: u64, to: u64, confirmed: u64) {
        let Some(every) = self.settings.print_progress_interval else {
            return;
        };
        let mut last = self.last_report.lock();
        if last.elapsed() <= every {
            return;
        }
        *last = Instant::now();
        tracing::info!(
            watcher = %self.name,
            from,
            to,
            behind = confirmed.saturating_sub(to),
            "catching up",
        );
    }
}

#[async_trait::async_trait]
impl<D, C, S> PeriodicTask for ChainWatcher<D, C, S>
where
    D: Direction,
    C: ChainClient,
    S: ProposalStore,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn tick(&self) -> bridge_relayer_utils::Result<TickStatus> {
        self.catch_up().await
    }
}
