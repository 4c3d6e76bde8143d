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
//! # Chain Client 🔗
//!
//! The thin RPC facade the watchers and signers talk to. Every call is
//! fallible and the callers decide locally whether to retry on the next tick.

use std::sync::Arc;

use ethers::types::{Address, Bytes, Log, H256, U256};

/// ABI helpers: topics, call encoding and proposal ids.
pub mod abi;
/// [`ChainClient`] over an ethers HTTP provider.
pub mod evm;
/// A scriptable in-memory chain.
pub mod mock;

pub use evm::EthersChainClient;

/// A transaction the relayer signs and sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingTx {
    /// The contract being called.
    pub to: Address,
    /// ABI encoded call.
    pub data: Bytes,
    /// Gas limit.
    pub gas: U256,
    /// Gas price in wei.
    pub gas_price: U256,
    /// Sender nonce.
    pub nonce: U256,
}

/// The operations the relayer needs from a chain node.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// The latest block height.
    async fn current_height(&self) -> bridge_relayer_utils::Result<u64>;

    /// Logs emitted by `address` in the inclusive block range `[from, to]`.
    /// `topics[i]`, when set, must equal the i-th topic of a matching log.
    async fn logs_in_range(
        &self,
        from: u64,
        to: u64,
        address: Address,
        topics: &[Option<H256>],
    ) -> bridge_relayer_utils::Result<Vec<Log>>;

    /// Whether `tx_hash` was mined and has a receipt.
    async fn receipt_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool>;

    /// Whether the node knows `tx_hash` at all, mined or in the mempool.
    async fn transaction_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool>;

    /// The next nonce of the relayer account, pending transactions included.
    async fn pending_nonce(&self) -> bridge_relayer_utils::Result<U256>;

    /// The relayer account, if this client can sign.
    fn address(&self) -> Option<Address>;

    /// Signs and sends `tx`, returning its hash.
    async fn submit(&self, tx: OutgoingTx) -> bridge_relayer_utils::Result<H256>;
}

#[async_trait::async_trait]
impl<C> ChainClient for Arc<C>
where
    C: ChainClient + ?Sized,
{
    async fn current_height(&self) -> bridge_relayer_utils::Result<u64> {
        C::current_height(self).await
    }

    async fn logs_in_range(
        &self,
        from: u64,
        to: u64,
        address: Address,
        topics: &[Option<H256>],
    ) -> bridge_relayer_utils::Result<Vec<Log>> {
        C::logs_in_range(self, from, to, address, topics).await
    }

    async fn receipt_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        C::receipt_exists(self, tx_hash).await
    }

    async fn transaction_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        C::transaction_exists(self, tx_hash).await
    }

    async fn pending_nonce(&self) -> bridge_relayer_utils::Result<U256> {
        C::pending_nonce(self).await
    }

    fn address(&self) -> Option<Address> {
        C::address(self)
    }

    async fn submit(&self, tx: OutgoingTx) -> bridge_relayer_utils::Result<H256> {
        C::submit(self, tx).await
    }
}
