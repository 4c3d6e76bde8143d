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

use std::sync::Arc;

use ethers::types::{Bytes, H256};

use bridge_relayer_context::RelayerContext;
use bridge_relayer_store::{
    Prefix, Proposal, ProposalId, ProposalStore, SledStore, PROPOSAL_INDEX,
    UNSIGNED_TAG,
};

fn network(name: &str, chain_id: u64, key: Option<&str>) -> serde_json::Value {
    let mut net = serde_json::json!({
        "name": name,
        "http-endpoint": "http://localhost:8545",
        "chain-id": chain_id,
        "token-contract": "0x0000000000000000000000000000000000000001",
        "multi-sign-contract": "0x0000000000000000000000000000000000000002",
    });
    if let Some(key) = key {
        net["private-key"] = key.into();
    }
    net
}

/// A context over a temporary store, with a key on the home network only.
pub fn context() -> Arc<RelayerContext> {
    let config = serde_json::from_value(serde_json::json!({
        "home": network("home", 1, Some(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )),
        "foreign": network("foreign", 2, None),
    }))
    .unwrap();
    let store = SledStore::temporary().unwrap();
    Arc::new(RelayerContext::new(config, store).unwrap())
}

/// Appends `n` unsigned proposals to `prefix`, the i-th one from block i.
pub fn seed(ctx: &RelayerContext, prefix: Prefix, n: u64) -> Vec<ProposalId> {
    (1..=n)
        .map(|i| {
            let id = H256::from_low_u64_be(0x1000 + i);
            let payload = Proposal {
                hash: H256::from_low_u64_be(i),
                calldata: Bytes::from(vec![0xca, i as u8]),
                block: i,
            };
            ctx.store()
                .append_indexed(
                    prefix,
                    id,
                    PROPOSAL_INDEX,
                    &payload,
                    Some(UNSIGNED_TAG),
                )
                .unwrap();
            id
        })
        .collect()
}
