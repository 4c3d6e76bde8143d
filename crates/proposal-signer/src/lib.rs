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
//! # Proposal Signer ✍️
//!
//! Moves the proposals of one direction through `unsigned`, `pending` and
//! `signed`. Unsigned proposals are suggested to the multi-sign contract of
//! the destination chain; pending ones are checked against the chain until
//! their transaction is mined, or sent back to `unsigned` when the chain
//! forgot about it.

use std::time::Duration;

use ethers::types::{Address, H256, U256};

use bridge_chain_client::{abi, ChainClient, OutgoingTx};
use bridge_relayer_store::{
    DatumWithTag, Prefix, ProposalStore, TagValue, PENDING_TAG, SIGNED_TAG,
    UNSIGNED_TAG,
};
use bridge_relayer_utils::metric::Metrics;
use bridge_relayer_utils::{clickable_link, probe, retry};
use bridge_scheduler::{BusyFlag, PeriodicTask, TickStatus};

mod nonce;

pub use nonce::NonceTracker;

/// How a signer sends its transactions.
#[derive(Debug, Clone)]
pub struct SignerSettings {
    /// The multi-sign contract of the chain the signer sends to.
    pub multi_sign: Address,
    /// Gas limit of a suggest transaction.
    pub gas: U256,
    /// Gas price of a suggest transaction.
    pub gas_price: U256,
    /// Unfinished proposals handled per tick.
    pub batch: usize,
    /// Block explorer of the chain, for clickable links.
    pub explorer: Option<url::Url>,
}

/// What reconciling a submitted proposal found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The transaction was mined, the proposal is signed.
    Signed,
    /// The chain does not know the transaction, the proposal is unsigned again.
    Reverted,
    /// The transaction is still waiting to be mined.
    InFlight,
}

/// Signs the proposals of one prefix on one chain.
pub struct ProposalSigner<C, S> {
    name: String,
    prefix: Prefix,
    client: C,
    store: S,
    settings: SignerSettings,
    metrics: Metrics,
    busy: BusyFlag,
    nonce: NonceTracker,
}

impl<C, S> std::fmt::Debug for ProposalSigner<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposalSigner")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<C, S> ProposalSigner<C, S>
where
    C: ChainClient,
    S: ProposalStore,
{
    /// Creates a signer for the proposals of `prefix`, sending through
    /// `client`.
    pub fn new(
        name: impl Into<String>,
        prefix: Prefix,
        client: C,
        store: S,
        settings: SignerSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            name: name.into(),
            prefix,
            client,
            store,
            settings,
            metrics,
            busy: BusyFlag::new(),
            nonce: NonceTracker::default(),
        }
    }

    /// One round: reconcile what was submitted, then submit what was not.
    #[tracing::instrument(skip_all, fields(prefix = %self.prefix))]
    pub async fn sign(&self) -> bridge_relayer_utils::Result<TickStatus> {
        let Some(_guard) = self.busy.try_acquire() else {
            tracing::trace!(signer = %self.name, "still signing, skipped");
            return Ok(TickStatus::Skipped);
        };
        let rows = self.store.unfinished(self.prefix, self.settings.batch)?;
        if rows.is_empty() {
            return Ok(TickStatus::Idle);
        }
        let (pending, unsigned): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|row| row.tag == PENDING_TAG || row.tag_value.is_tx_hash());
        tracing::trace!(
            pending = pending.len(),
            unsigned = unsigned.len(),
            "unfinished proposals",
        );

        for row in &pending {
            if let Err(e) = self.reconcile(row).await {
                // nothing moved, the next tick looks at it again.
                tracing::warn!(sequence = row.sequence, error = %e, "reconciliation failed");
            }
        }
        if !unsigned.is_empty() {
            self.submit_all(&unsigned).await?;
        }
        Ok(TickStatus::Worked)
    }

    /// Checks the transaction of a submitted proposal.
    #[tracing::instrument(skip_all, fields(sequence = row.sequence))]
    pub async fn reconcile(
        &self,
        row: &DatumWithTag,
    ) -> bridge_relayer_utils::Result<Reconciled> {
        let Some(tx_hash) = row.tag_value.tx_hash() else {
            tracing::warn!(value = ?row.tag_value, "unreadable transaction hash");
            self.revert(row)?;
            return Ok(Reconciled::Reverted);
        };
        if self.client.receipt_exists(tx_hash).await? {
            self.store
                .move_tag(self.prefix, &row.tag, SIGNED_TAG, row.sequence, None)?;
            self.metrics.proposals_signed.inc();
            tracing::info!(tx = %self.link(tx_hash), "proposal signed");
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Signer,
                prefix = %self.prefix,
                sequence = row.sequence,
                signed = true,
                tx_hash = %format!("{tx_hash:#x}"),
            );
            return Ok(Reconciled::Signed);
        }
        if self.client.transaction_exists(tx_hash).await? {
            tracing::trace!(tx = %self.link(tx_hash), "still in flight");
            return Ok(Reconciled::InFlight);
        }
        tracing::warn!(
            tx = %self.link(tx_hash),
            "transaction vanished, the proposal will be suggested again",
        );
        self.revert(row)?;
        Ok(Reconciled::Reverted)
    }

    fn revert(&self, row: &DatumWithTag) -> bridge_relayer_utils::Result<()> {
        self.store.move_tag(
            self.prefix,
            &row.tag,
            UNSIGNED_TAG,
            row.sequence,
            Some(&TagValue::unsigned()),
        )?;
        self.metrics.proposals_reverted.inc();
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Signer,
            prefix = %self.prefix,
            sequence = row.sequence,
            reverted = true,
        );
        Ok(())
    }

    async fn submit_all(
        &self,
        rows: &[DatumWithTag],
    ) -> bridge_relayer_utils::Result<()> {
        let pending_nonce = self.client.pending_nonce().await?;
        let mut nonce = self.nonce.next(pending_nonce);
        for row in rows {
            let Some(proposal) = &row.value else {
                tracing::warn!(sequence = row.sequence, "proposal without payload");
                continue;
            };
            let tx = OutgoingTx {
                to: self.settings.multi_sign,
                data: abi::suggest_call(proposal.hash, &proposal.calldata),
                gas: self.settings.gas,
                gas_price: self.settings.gas_price,
                nonce,
            };
            let tx_hash = match self.client.submit(tx).await {
                Ok(tx_hash) => tx_hash,
                Err(e) => {
                    tracing::warn!(
                        sequence = row.sequence,
                        %nonce,
                        error = %e,
                        "failed to suggest, will retry",
                    );
                    continue;
                }
            };
            self.nonce.record(nonce);
            nonce += U256::one();
            if let Err(e) = self.mark_pending(row, tx_hash).await {
                // the row stays unsigned and is suggested again next tick.
                tracing::error!(
                    sequence = row.sequence,
                    tx_hash = %format!("{tx_hash:#x}"),
                    error = %e,
                    "suggested, but failed to record the transaction",
                );
                continue;
            }
            self.metrics.proposals_submitted.inc();
            tracing::info!(
                sequence = row.sequence,
                "Tx {} is submitted and pending!",
                self.link(tx_hash),
            );
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Signer,
                prefix = %self.prefix,
                sequence = row.sequence,
                pending = true,
                tx_hash = %format!("{tx_hash:#x}"),
            );
        }
        Ok(())
    }

    async fn mark_pending(
        &self,
        row: &DatumWithTag,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<()> {
        let backoff = retry::ConstantWithMaxRetryCount::new(
            Duration::from_millis(100),
            3,
        );
        let value = TagValue::submitted(tx_hash);
        let record = || {
            let result = self
                .store
                .move_tag(
                    self.prefix,
                    &row.tag,
                    PENDING_TAG,
                    row.sequence,
                    Some(&value),
                )
                .map_err(backoff::Error::transient);
            std::future::ready(result)
        };
        backoff::future::retry(backoff, record).await
    }

    fn link(&self, tx_hash: H256) -> String {
        clickable_link::tx_link(
            self.settings.explorer.as_ref(),
            &format!("{tx_hash:#x}"),
        )
    }
}

#[async_trait::async_trait]
impl<C, S> PeriodicTask for ProposalSigner<C, S>
where
    C: ChainClient,
    S: ProposalStore,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn tick(&self) -> bridge_relayer_utils::Result<TickStatus> {
        self.sign().await
    }
}

#[cfg(test)]
mod tests;
