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

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the bridge relayer.
//!
//! ## Overview
//!
//! The configuration is read from every `toml` and `json` file of a config
//! directory, merged with the `BRIDGE_` prefixed environment.
//! Possible configuration include:
//! * `port`: The port the query API will listen on. Defaults to 3000
//! * `interval`: The cadence of the workers in seconds. Defaults to 4
//! * `home` and `foreign`: the two networks being bridged. See
//!   [config/local](../../config/local) for an example.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Default values of the optional settings.
pub mod defaults;
/// Utils for processing configuration
pub mod utils;

use std::time::Duration;

use bridge_relayer_types::private_key::PrivateKey;
use bridge_relayer_types::rpc_url::RpcUrl;
use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// The `net-type` of networks that need a confirmation depth.
pub const ETH_NET_TYPE: &str = "eth";
/// Blocks to wait on an `eth` network before trusting its logs.
pub const ETH_CONFIRMATIONS: u64 = 12;

/// BridgeRelayerConfig is the configuration for the bridge relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "kebab-case", serialize = "camelCase"))]
pub struct BridgeRelayerConfig {
    /// Query API port number
    ///
    /// default to 3000
    #[serde(default = "defaults::port", skip_serializing)]
    pub port: u16,
    /// Seconds between two firings of a worker, below a minute.
    #[serde(default = "defaults::interval")]
    pub interval: u64,
    /// Seconds a tick may run before it is abandoned.
    #[serde(default = "defaults::tick_timeout")]
    pub tick_timeout: u64,
    /// How many unfinished proposals a signer handles per tick.
    #[serde(default = "defaults::signer_batch")]
    pub signer_batch: usize,
    /// Which parts of the relayer run.
    #[serde(default)]
    pub features: FeaturesConfig,
    /// The network tokens are locked on.
    pub home: NetworkConfig,
    /// The network the bridged token is issued on.
    pub foreign: NetworkConfig,
}

impl BridgeRelayerConfig {
    /// Makes sure that the config is valid, by going
    /// through the whole config and doing some basic checks.
    pub fn verify(&self) -> bridge_relayer_utils::Result<()> {
        if !(1..=59).contains(&self.interval) {
            return Err(bridge_relayer_utils::Error::Generic(
                "interval must be between 1 and 59 seconds",
            ));
        }
        if self.tick_timeout == 0 {
            return Err(bridge_relayer_utils::Error::Generic(
                "tick-timeout must be at least one second",
            ));
        }
        // signing needs a key on both sides: each chain signs the proposals
        // headed to it.
        let has_keys =
            self.home.private_key.is_some() && self.foreign.private_key.is_some();
        if self.features.sign && !has_keys {
            return Err(bridge_relayer_utils::Error::MissingSecrets);
        }
        Ok(())
    }

    /// The cadence of the workers.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// The time budget of a tick.
    pub fn tick_timeout(&self) -> Duration {
        Duration::from_secs(self.tick_timeout)
    }
}

/// FeaturesConfig is the configuration for running relayer with option.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "kebab-case", serialize = "camelCase"))]
pub struct FeaturesConfig {
    /// Run the chain watchers.
    #[serde(default = "defaults::enabled")]
    pub watch: bool,
    /// Run the proposal signers.
    #[serde(default = "defaults::enabled")]
    pub sign: bool,
    /// Serve the query API.
    #[serde(default = "defaults::enabled")]
    pub query_api: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            watch: true,
            sign: true,
            query_api: true,
        }
    }
}

/// One side of the bridge.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "kebab-case", serialize = "camelCase"))]
pub struct NetworkConfig {
    /// Human readable name, used in logs.
    pub name: String,
    /// Http(s) Endpoint for quick Req/Res
    #[serde(skip_serializing)]
    pub http_endpoint: RpcUrl,
    /// `eth` networks wait [`ETH_CONFIRMATIONS`] blocks, others none.
    #[serde(default = "defaults::net_type")]
    pub net_type: String,
    /// Overrides the confirmation depth derived from `net-type`.
    #[serde(default)]
    pub confirmations: Option<u64>,
    /// Chain id, used when signing transactions.
    pub chain_id: u64,
    /// The token whose events are watched.
    pub token_contract: Address,
    /// The multi-sign contract suggestions are sent to.
    pub multi_sign_contract: Address,
    /// First block scanned when no cursor is stored.
    #[serde(default = "defaults::from_height")]
    pub from_height: u64,
    /// Upper bound of blocks fetched per tick.
    #[serde(default = "defaults::max_blocks_per_step")]
    pub max_blocks_per_step: u64,
    /// Gas price of suggest transactions, in wei.
    #[serde(default)]
    pub gas_price: u64,
    /// Gas limit of suggest transactions.
    #[serde(default = "defaults::gas_limit")]
    pub gas_limit: u64,
    /// The Private Key of this account on this network.
    /// See [`PrivateKey`] for the accepted forms.
    #[serde(skip_serializing)]
    pub private_key: Option<PrivateKey>,
    /// Block explorer, used to print clickable transaction links.
    #[serde(default)]
    pub explorer: Option<url::Url>,
    /// How often, in milliseconds, the watcher reports its progress at INFO.
    /// `0` disables the report.
    #[serde(default = "defaults::print_progress_interval")]
    pub print_progress_interval: u64,
}

impl NetworkConfig {
    /// Blocks behind the head that are not scanned yet.
    pub fn confirmations(&self) -> u64 {
        self.confirmations.unwrap_or_else(|| {
            if self.net_type.eq_ignore_ascii_case(ETH_NET_TYPE) {
                ETH_CONFIRMATIONS
            } else {
                0
            }
        })
    }

    /// The progress report period, if enabled.
    pub fn print_progress_interval(&self) -> Option<Duration> {
        (self.print_progress_interval != 0)
            .then(|| Duration::from_millis(self.print_progress_interval))
    }
}
