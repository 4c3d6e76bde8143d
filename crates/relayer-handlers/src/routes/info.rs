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

use axum::extract::State;
use axum::Json;
use ethers::types::Address;
use serde::Serialize;

use bridge_relayer_config::BridgeRelayerConfig;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_store::Prefix;

/// The account the relayer signs with on each network.
#[derive(Debug, Serialize)]
pub struct RelayerAccounts {
    home: Option<Address>,
    foreign: Option<Address>,
}

/// The public configuration of the relayer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayerInformationResponse {
    #[serde(flatten)]
    config: BridgeRelayerConfig,
    relayers: RelayerAccounts,
}

/// Handles the relayer info request: the networks and contracts the relayer
/// bridges, without endpoints or secrets, and the relayer account on each
/// network.
pub async fn handle_relayer_info(
    State(ctx): State<Arc<RelayerContext>>,
) -> Json<RelayerInformationResponse> {
    let relayers = RelayerAccounts {
        home: ctx.relayer_address(Prefix::Home),
        foreign: ctx.relayer_address(Prefix::Foreign),
    };
    Json(RelayerInformationResponse {
        config: ctx.config.clone(),
        relayers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context;

    #[tokio::test]
    async fn secrets_are_not_exposed() {
        let Json(info) = handle_relayer_info(State(context())).await;
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(
            json["relayers"]["home"],
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
        assert!(json["relayers"]["foreign"].is_null());
        assert_eq!(json["home"]["chainId"], 1);
        assert_eq!(
            json["signerBatch"],
            bridge_relayer_config::defaults::signer_batch()
        );
        let text = json.to_string();
        assert!(!text.contains("privateKey"));
        assert!(!text.contains("httpEndpoint"));
        assert!(!text.contains("localhost"));
    }
}
