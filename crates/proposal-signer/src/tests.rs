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

use std::collections::BTreeMap;
use std::sync::Arc;

use ethers::types::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use bridge_chain_client::mock::MockChainClient;
use bridge_relayer_store::{
    AppendOutcome, IndexEntry, InMemoryStore, Proposal, ProposalId,
    RangeQuery, TagEntry, PROPOSAL_INDEX,
};
use bridge_relayer_utils::Error;

use super::*;

const MULTI_SIGN: u64 = 0x75;

fn settings(batch: usize) -> SignerSettings {
    SignerSettings {
        multi_sign: Address::from_low_u64_be(MULTI_SIGN),
        gas: U256::from(300_000u64),
        gas_price: U256::from(1_000_000_000u64),
        batch,
        explorer: None,
    }
}

fn signer(
    chain: &Arc<MockChainClient>,
    store: &InMemoryStore,
    batch: usize,
) -> ProposalSigner<Arc<MockChainClient>, InMemoryStore> {
    ProposalSigner::new(
        "home-sign",
        Prefix::Foreign,
        chain.clone(),
        store.clone(),
        settings(batch),
        Metrics::new().unwrap(),
    )
}

fn proposal(n: u64) -> Proposal {
    Proposal {
        hash: H256::from_low_u64_be(n),
        calldata: Bytes::from(vec![0x01, n as u8]),
        block: n,
    }
}

/// Stores `n` unsigned proposals for `foreign`.
fn seed(store: &InMemoryStore, n: u64) {
    for i in 1..=n {
        store
            .append_indexed(
                Prefix::Foreign,
                H256::from_low_u64_be(0xabc0 + i),
                PROPOSAL_INDEX,
                &proposal(i),
                Some(UNSIGNED_TAG),
            )
            .unwrap();
    }
}

/// Puts `sequence` in `tag` with `value`, wherever it is now.
fn retag(store: &InMemoryStore, sequence: u64, tag: &str, value: TagValue) {
    let current = bucket_of(store, sequence).expect("sequence is tagged");
    store
        .move_tag(Prefix::Foreign, current, tag, sequence, Some(&value))
        .unwrap();
}

fn entry(store: &InMemoryStore, tag: &str, sequence: u64) -> Option<TagValue> {
    let query = RangeQuery::all().from(sequence).to(sequence);
    store
        .range_by_tag(Prefix::Foreign, tag, &query)
        .unwrap()
        .pop()
        .map(|e| e.value)
}

/// The only bucket holding `sequence`.
fn bucket_of(store: &InMemoryStore, sequence: u64) -> Option<&'static str> {
    let found: Vec<_> = [UNSIGNED_TAG, PENDING_TAG, SIGNED_TAG]
        .into_iter()
        .filter(|tag| entry(store, tag, sequence).is_some())
        .collect();
    assert!(found.len() <= 1, "sequence {sequence} is in {found:?}");
    found.first().copied()
}

fn ghost() -> H256 {
    H256::from_low_u64_be(0xdeadbeef)
}

#[tokio::test]
async fn suggests_unsigned_proposals_oldest_first() {
    let chain = Arc::new(MockChainClient::default());
    chain.set_nonce(U256::from(5u64));
    let store = InMemoryStore::default();
    seed(&store, 3);
    let signer = signer(&chain, &store, 30);

    assert_eq!(signer.sign().await.unwrap(), TickStatus::Worked);

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 3);
    for (i, (tx_hash, tx)) in submitted.iter().enumerate() {
        let n = i as u64 + 1;
        assert_eq!(tx.to, Address::from_low_u64_be(MULTI_SIGN));
        assert_eq!(tx.nonce, U256::from(5 + i as u64));
        assert_eq!(
            tx.data,
            abi::suggest_call(H256::from_low_u64_be(n), &proposal(n).calldata)
        );
        assert_eq!(bucket_of(&store, n), Some(PENDING_TAG));
        assert_eq!(
            entry(&store, PENDING_TAG, n),
            Some(TagValue::submitted(*tx_hash))
        );
    }
    assert_eq!(signer.metrics.proposals_submitted.get() as u64, 3);
}

#[tokio::test]
async fn nothing_to_do_is_idle() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    let signer = signer(&chain, &store, 30);
    assert_eq!(signer.sign().await.unwrap(), TickStatus::Idle);
}

#[tokio::test]
async fn mined_transactions_sign_the_proposal() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 7);
    for sequence in 1..=6 {
        retag(&store, sequence, SIGNED_TAG, TagValue::unsigned());
    }
    retag(&store, 7, PENDING_TAG, TagValue::submitted(ghost()));
    chain.confirm(ghost());
    let signer = signer(&chain, &store, 30);

    signer.sign().await.unwrap();

    assert_eq!(bucket_of(&store, 7), Some(SIGNED_TAG));
    assert!(chain.submitted().is_empty());
    assert_eq!(signer.metrics.proposals_signed.get() as u64, 1);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn vanished_transactions_are_suggested_again() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 9);
    for sequence in 1..=8 {
        retag(&store, sequence, SIGNED_TAG, TagValue::unsigned());
    }
    retag(&store, 9, PENDING_TAG, TagValue::submitted(ghost()));
    let signer = signer(&chain, &store, 30);

    signer.sign().await.unwrap();

    assert_eq!(bucket_of(&store, 9), Some(UNSIGNED_TAG));
    assert_eq!(entry(&store, UNSIGNED_TAG, 9), Some(TagValue::unsigned()));
    assert!(chain.submitted().is_empty());
    assert!(logs_contain("transaction vanished"));

    // the next tick picks it up as a fresh proposal.
    signer.sign().await.unwrap();
    assert_eq!(chain.submitted().len(), 1);
    assert_eq!(bucket_of(&store, 9), Some(PENDING_TAG));
    assert_eq!(signer.metrics.proposals_reverted.get() as u64, 1);
}

#[tokio::test]
async fn in_flight_transactions_are_left_alone() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 1);
    retag(&store, 1, PENDING_TAG, TagValue::submitted(ghost()));
    chain.add_known_transaction(ghost());
    let signer = signer(&chain, &store, 30);

    signer.sign().await.unwrap();

    assert_eq!(
        entry(&store, PENDING_TAG, 1),
        Some(TagValue::submitted(ghost()))
    );
    assert_eq!(bucket_of(&store, 1), Some(PENDING_TAG));
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn unreadable_pending_values_are_reverted() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 1);
    retag(&store, 1, PENDING_TAG, TagValue::TxHash("0xghost".into()));
    let signer = signer(&chain, &store, 30);

    signer.sign().await.unwrap();

    assert_eq!(entry(&store, UNSIGNED_TAG, 1), Some(TagValue::unsigned()));
}

#[tokio::test]
async fn unsigned_entries_holding_a_hash_are_reconciled() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 1);
    retag(&store, 1, UNSIGNED_TAG, TagValue::submitted(ghost()));
    chain.confirm(ghost());
    let signer = signer(&chain, &store, 30);

    signer.sign().await.unwrap();

    assert_eq!(bucket_of(&store, 1), Some(SIGNED_TAG));
    assert!(chain.submitted().is_empty());
}

#[tokio::test]
async fn rpc_failures_move_nothing() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 2);
    retag(&store, 1, PENDING_TAG, TagValue::submitted(ghost()));
    chain.fail_receipts(true);
    chain.fail_submit(true);
    let signer = signer(&chain, &store, 30);

    signer.sign().await.unwrap();

    assert_eq!(
        entry(&store, PENDING_TAG, 1),
        Some(TagValue::submitted(ghost()))
    );
    assert_eq!(entry(&store, UNSIGNED_TAG, 2), Some(TagValue::unsigned()));
    assert_eq!(signer.nonce.last(), None);

    chain.fail_submit(false);
    signer.sign().await.unwrap();
    assert_eq!(bucket_of(&store, 2), Some(PENDING_TAG));
    assert_eq!(chain.submitted()[0].1.nonce, U256::zero());
}

#[tokio::test]
async fn nonces_never_go_backwards() {
    let chain = Arc::new(MockChainClient::default());
    chain.set_nonce(U256::from(3u64));
    let store = InMemoryStore::default();
    seed(&store, 2);
    let signer = signer(&chain, &store, 30);
    signer.sign().await.unwrap();

    // a lagging node still reports an old pending count.
    chain.set_nonce(U256::zero());
    store
        .append_indexed(
            Prefix::Foreign,
            H256::from_low_u64_be(0xabcf),
            PROPOSAL_INDEX,
            &proposal(15),
            Some(UNSIGNED_TAG),
        )
        .unwrap();
    signer.sign().await.unwrap();

    let nonces: Vec<_> =
        chain.submitted().iter().map(|(_, tx)| tx.nonce.as_u64()).collect();
    assert_eq!(nonces, vec![3, 4, 5]);
}

#[tokio::test]
async fn proposals_go_through_pending_before_signed() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 1);
    let signer = signer(&chain, &store, 30);
    assert_eq!(bucket_of(&store, 1), Some(UNSIGNED_TAG));

    signer.sign().await.unwrap();
    assert_eq!(bucket_of(&store, 1), Some(PENDING_TAG));

    // not mined yet.
    signer.sign().await.unwrap();
    assert_eq!(bucket_of(&store, 1), Some(PENDING_TAG));

    let (tx_hash, _) = chain.submitted()[0].clone();
    chain.confirm(tx_hash);
    signer.sign().await.unwrap();
    assert_eq!(bucket_of(&store, 1), Some(SIGNED_TAG));
    assert_eq!(signer.sign().await.unwrap(), TickStatus::Idle);
    assert_eq!(chain.submitted().len(), 1);
}

#[tokio::test]
async fn batches_are_bounded() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 3);
    let signer = signer(&chain, &store, 2);

    signer.sign().await.unwrap();

    assert_eq!(chain.submitted().len(), 2);
    assert_eq!(bucket_of(&store, 3), Some(UNSIGNED_TAG));
}

#[tokio::test]
async fn a_busy_signer_skips_the_tick() {
    let chain = Arc::new(MockChainClient::default());
    let store = InMemoryStore::default();
    seed(&store, 1);
    let signer = signer(&chain, &store, 30);
    let guard = signer.busy.try_acquire();
    assert_eq!(signer.tick().await.unwrap(), TickStatus::Skipped);
    assert!(chain.submitted().is_empty());
    drop(guard);
    assert_eq!(signer.tick().await.unwrap(), TickStatus::Worked);
}

/// An [`InMemoryStore`] failing the moves of some sequences to `pending`.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: InMemoryStore,
    /// Failures left per sequence.
    failing: Arc<Mutex<BTreeMap<u64, usize>>>,
}

impl FlakyStore {
    fn fail_pending(&self, sequence: u64, times: usize) {
        self.failing.lock().insert(sequence, times);
    }
}

impl ProposalStore for FlakyStore {
    fn set_value<T: Serialize>(
        &self,
        prefix: Prefix,
        key: &str,
        value: &T,
    ) -> bridge_relayer_utils::Result<()> {
        self.inner.set_value(prefix, key, value)
    }

    fn get_value<T: DeserializeOwned>(
        &self,
        prefix: Prefix,
        key: &str,
    ) -> bridge_relayer_utils::Result<Option<T>> {
        self.inner.get_value(prefix, key)
    }

    fn append_indexed(
        &self,
        prefix: Prefix,
        id: ProposalId,
        index: &str,
        payload: &Proposal,
        tag: Option<&str>,
    ) -> bridge_relayer_utils::Result<AppendOutcome> {
        self.inner.append_indexed(prefix, id, index, payload, tag)
    }

    fn move_tag(
        &self,
        prefix: Prefix,
        old_tag: &str,
        new_tag: &str,
        sequence: u64,
        value: Option<&TagValue>,
    ) -> bridge_relayer_utils::Result<()> {
        if new_tag == PENDING_TAG {
            let mut failing = self.failing.lock();
            if let Some(left) = failing.get_mut(&sequence) {
                if *left > 0 {
                    *left -= 1;
                    return Err(Error::Generic("disk full"));
                }
            }
        }
        self.inner.move_tag(prefix, old_tag, new_tag, sequence, value)
    }

    fn get_count(
        &self,
        prefix: Prefix,
        index: &str,
    ) -> bridge_relayer_utils::Result<u64> {
        self.inner.get_count(prefix, index)
    }

    fn range_by_index(
        &self,
        prefix: Prefix,
        index: &str,
        query: &RangeQuery,
    ) -> bridge_relayer_utils::Result<Vec<IndexEntry>> {
        self.inner.range_by_index(prefix, index, query)
    }

    fn range_by_tag(
        &self,
        prefix: Prefix,
        tag: &str,
        query: &RangeQuery,
    ) -> bridge_relayer_utils::Result<Vec<TagEntry>> {
        self.inner.range_by_tag(prefix, tag, query)
    }

    fn sequence_of(
        &self,
        prefix: Prefix,
        index: &str,
        id: &ProposalId,
    ) -> bridge_relayer_utils::Result<Option<u64>> {
        self.inner.sequence_of(prefix, index, id)
    }
}

fn flaky_signer(
    chain: &Arc<MockChainClient>,
    store: &FlakyStore,
) -> ProposalSigner<Arc<MockChainClient>, FlakyStore> {
    ProposalSigner::new(
        "home-sign",
        Prefix::Foreign,
        chain.clone(),
        store.clone(),
        settings(30),
        Metrics::new().unwrap(),
    )
}

#[tokio::test]
async fn recording_a_suggestion_is_retried() {
    let chain = Arc::new(MockChainClient::default());
    let store = FlakyStore::default();
    seed(&store.inner, 3);
    store.fail_pending(1, 2);
    let signer = flaky_signer(&chain, &store);

    assert_eq!(signer.sign().await.unwrap(), TickStatus::Worked);

    let submitted = chain.submitted();
    assert_eq!(submitted.len(), 3);
    assert_eq!(
        entry(&store.inner, PENDING_TAG, 1),
        Some(TagValue::submitted(submitted[0].0))
    );
    for sequence in 1..=3 {
        assert_eq!(bucket_of(&store.inner, sequence), Some(PENDING_TAG));
    }
}

#[tokio::test]
#[tracing_test::traced_test]
async fn an_unrecorded_suggestion_does_not_stop_the_batch() {
    let chain = Arc::new(MockChainClient::default());
    let store = FlakyStore::default();
    seed(&store.inner, 3);
    store.fail_pending(1, usize::MAX);
    let signer = flaky_signer(&chain, &store);

    assert_eq!(signer.sign().await.unwrap(), TickStatus::Worked);

    assert_eq!(chain.submitted().len(), 3);
    assert_eq!(entry(&store.inner, UNSIGNED_TAG, 1), Some(TagValue::unsigned()));
    assert_eq!(bucket_of(&store.inner, 2), Some(PENDING_TAG));
    assert_eq!(bucket_of(&store.inner, 3), Some(PENDING_TAG));
    assert!(logs_contain("failed to record the transaction"));
    assert!(logs_contain(&format!("{:#x}", chain.submitted()[0].0)));
    assert_eq!(signer.metrics.proposals_submitted.get() as u64, 2);

    store.fail_pending(1, 0);
    signer.sign().await.unwrap();
    assert_eq!(chain.submitted().len(), 4);
    assert_eq!(bucket_of(&store.inner, 1), Some(PENDING_TAG));
}
