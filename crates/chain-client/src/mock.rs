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

//! An in-memory chain for tests: the height, the logs, the mempool and the
//! receipts are all set by hand, and every call can be told to fail.

use std::collections::HashSet;

use ethers::types::{Address, Bytes, Log, H256, U256, U64};
use parking_lot::Mutex;

use bridge_relayer_utils::Error;

use crate::{abi, ChainClient, OutgoingTx};

#[derive(Debug, Default)]
struct MockState {
    height: u64,
    logs: Vec<Log>,
    known: HashSet<H256>,
    receipts: HashSet<H256>,
    nonce: U256,
    submitted: Vec<(H256, OutgoingTx)>,
    log_queries: Vec<(u64, u64)>,
    fail_height: bool,
    fail_logs: bool,
    fail_submit: bool,
    fail_receipts: bool,
}

/// A scriptable [`ChainClient`].
#[derive(Debug)]
pub struct MockChainClient {
    address: Address,
    state: Mutex<MockState>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new(Address::from_low_u64_be(0x5e1f))
    }
}

impl MockChainClient {
    /// A chain at height 0 whose signing account is `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Sets the chain height.
    pub fn set_height(&self, height: u64) {
        self.state.lock().height = height;
    }

    /// Adds a log emitted by `address` in `block` by transaction `tx_hash`.
    pub fn push_log(
        &self,
        address: Address,
        block: u64,
        tx_hash: H256,
        topics: Vec<H256>,
        data: Bytes,
    ) {
        let log = Log {
            address,
            topics,
            data,
            block_number: Some(U64::from(block)),
            transaction_hash: Some(tx_hash),
            ..Default::default()
        };
        self.state.lock().logs.push(log);
    }

    /// Adds a `Transfer(from, to, value)` log.
    pub fn push_transfer(
        &self,
        token: Address,
        block: u64,
        tx_hash: H256,
        from: Address,
        to: Address,
        value: U256,
    ) {
        let topics = vec![
            abi::event_topic(abi::TRANSFER_EVENT),
            abi::address_topic(from),
            abi::address_topic(to),
        ];
        self.push_log(token, block, tx_hash, topics, uint_data(value));
    }

    /// Adds a `Burn(from, value)` log.
    pub fn push_burn(
        &self,
        token: Address,
        block: u64,
        tx_hash: H256,
        from: Address,
        value: U256,
    ) {
        let topics =
            vec![abi::event_topic(abi::BURN_EVENT), abi::address_topic(from)];
        self.push_log(token, block, tx_hash, topics, uint_data(value));
    }

    /// Makes the node know `tx_hash` without a receipt, like a mempool entry.
    pub fn add_known_transaction(&self, tx_hash: H256) {
        self.state.lock().known.insert(tx_hash);
    }

    /// Mines `tx_hash`: the node knows it and has its receipt.
    pub fn confirm(&self, tx_hash: H256) {
        let mut state = self.state.lock();
        state.known.insert(tx_hash);
        state.receipts.insert(tx_hash);
    }

    /// Drops `tx_hash` from the mempool.
    pub fn evict(&self, tx_hash: H256) {
        let mut state = self.state.lock();
        state.known.remove(&tx_hash);
        state.receipts.remove(&tx_hash);
    }

    /// Sets the pending nonce of the signing account.
    pub fn set_nonce(&self, nonce: U256) {
        self.state.lock().nonce = nonce;
    }

    /// Makes `current_height` fail.
    pub fn fail_height(&self, fail: bool) {
        self.state.lock().fail_height = fail;
    }

    /// Makes `logs_in_range` fail.
    pub fn fail_logs(&self, fail: bool) {
        self.state.lock().fail_logs = fail;
    }

    /// Makes `submit` fail.
    pub fn fail_submit(&self, fail: bool) {
        self.state.lock().fail_submit = fail;
    }

    /// Makes the receipt and transaction lookups fail.
    pub fn fail_receipts(&self, fail: bool) {
        self.state.lock().fail_receipts = fail;
    }

    /// Every transaction sent so far, with the hash it got.
    pub fn submitted(&self) -> Vec<(H256, OutgoingTx)> {
        self.state.lock().submitted.clone()
    }

    /// Every `[from, to]` range logs were requested for.
    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.state.lock().log_queries.clone()
    }
}

fn uint_data(value: U256) -> Bytes {
    ethers::abi::encode(&[ethers::abi::Token::Uint(value)]).into()
}

#[async_trait::async_trait]
impl ChainClient for MockChainClient {
    async fn current_height(&self) -> bridge_relayer_utils::Result<u64> {
        let state = self.state.lock();
        if state.fail_height {
            return Err(Error::Generic("mock: height unavailable"));
        }
        Ok(state.height)
    }

    async fn logs_in_range(
        &self,
        from: u64,
        to: u64,
        address: Address,
        topics: &[Option<H256>],
    ) -> bridge_relayer_utils::Result<Vec<Log>> {
        let mut state = self.state.lock();
        if state.fail_logs {
            return Err(Error::Generic("mock: logs unavailable"));
        }
        state.log_queries.push((from, to));
        let matches = |log: &&Log| {
            let block = log.block_number.map(|b| b.as_u64()).unwrap_or_default();
            let topics_match = topics.iter().enumerate().all(|(i, t)| match t {
                Some(t) => log.topics.get(i) == Some(t),
                None => true,
            });
            log.address == address && (from..=to).contains(&block) && topics_match
        };
        Ok(state.logs.iter().filter(matches).cloned().collect())
    }

    async fn receipt_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        let state = self.state.lock();
        if state.fail_receipts {
            return Err(Error::Generic("mock: receipts unavailable"));
        }
        Ok(state.receipts.contains(&tx_hash))
    }

    async fn transaction_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        let state = self.state.lock();
        if state.fail_receipts {
            return Err(Error::Generic("mock: transactions unavailable"));
        }
        Ok(state.known.contains(&tx_hash))
    }

    async fn pending_nonce(&self) -> bridge_relayer_utils::Result<U256> {
        Ok(self.state.lock().nonce)
    }

    fn address(&self) -> Option<Address> {
        Some(self.address)
    }

    async fn submit(&self, tx: OutgoingTx) -> bridge_relayer_utils::Result<H256> {
        let mut state = self.state.lock();
        if state.fail_submit {
            return Err(Error::Generic("mock: submission rejected"));
        }
        let mut preimage = tx.data.to_vec();
        preimage.extend_from_slice(&tx.nonce.as_u64().to_be_bytes());
        let tx_hash = abi::keccak_hash(&preimage);
        state.known.insert(tx_hash);
        state.nonce = state.nonce.max(tx.nonce + 1);
        state.submitted.push((tx_hash, tx));
        Ok(tx_hash)
    }
}
