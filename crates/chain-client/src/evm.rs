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

use std::time::Duration;

use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{
    Address, BlockNumber, Filter, Log, TransactionRequest, ValueOrArray, H256,
    U256,
};

use bridge_relayer_utils::Error;

use crate::{ChainClient, OutgoingTx};

/// A [`ChainClient`] talking JSON-RPC over HTTP. Submitting requires a wallet.
#[derive(Debug, Clone)]
pub struct EthersChainClient {
    provider: Provider<Http>,
    signer: Option<SignerMiddleware<Provider<Http>, LocalWallet>>,
}

impl EthersChainClient {
    /// A read only client for `endpoint`.
    pub fn new(endpoint: &url::Url) -> bridge_relayer_utils::Result<Self> {
        let provider = Provider::<Http>::try_from(endpoint.as_str())?
            .interval(Duration::from_millis(5u64));
        Ok(Self {
            provider,
            signer: None,
        })
    }

    /// Signs outgoing transactions with `wallet`.
    pub fn with_wallet(mut self, wallet: LocalWallet) -> Self {
        self.signer = Some(SignerMiddleware::new(self.provider.clone(), wallet));
        self
    }

    fn signer(
        &self,
    ) -> bridge_relayer_utils::Result<
        &SignerMiddleware<Provider<Http>, LocalWallet>,
    > {
        self.signer.as_ref().ok_or(Error::MissingSecrets)
    }
}

#[async_trait::async_trait]
impl ChainClient for EthersChainClient {
    async fn current_height(&self) -> bridge_relayer_utils::Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    #[tracing::instrument(skip(self, topics), fields(%address))]
    async fn logs_in_range(
        &self,
        from: u64,
        to: u64,
        address: Address,
        topics: &[Option<H256>],
    ) -> bridge_relayer_utils::Result<Vec<Log>> {
        let mut filter = Filter::new()
            .address(address)
            .from_block(from)
            .to_block(to);
        for (slot, topic) in filter.topics.iter_mut().zip(topics) {
            *slot = topic.map(|t| ValueOrArray::Value(Some(t)));
        }
        let logs = self.provider.get_logs(&filter).await?;
        tracing::trace!(found = logs.len(), "fetched logs");
        Ok(logs)
    }

    async fn receipt_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(self
            .provider
            .get_transaction_receipt(tx_hash)
            .await?
            .is_some())
    }

    async fn transaction_exists(
        &self,
        tx_hash: H256,
    ) -> bridge_relayer_utils::Result<bool> {
        Ok(self.provider.get_transaction(tx_hash).await?.is_some())
    }

    async fn pending_nonce(&self) -> bridge_relayer_utils::Result<U256> {
        let address = self.signer()?.address();
        let nonce = self
            .provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await?;
        Ok(nonce)
    }

    fn address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.signer().address())
    }

    #[tracing::instrument(skip_all, fields(to = %tx.to, nonce = %tx.nonce))]
    async fn submit(&self, tx: OutgoingTx) -> bridge_relayer_utils::Result<H256> {
        let signer = self.signer()?;
        let request = TransactionRequest::new()
            .from(signer.address())
            .to(tx.to)
            .data(tx.data)
            .gas(tx.gas)
            .gas_price(tx.gas_price)
            .nonce(tx.nonce)
            .chain_id(signer.signer().chain_id());
        let pending = signer.send_transaction(request, None).await?;
        Ok(pending.tx_hash())
    }
}
