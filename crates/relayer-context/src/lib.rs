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
//! # Relayer Context Module 🕸️
//!
//! A module for managing the context of the relayer.

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use tokio::sync::broadcast;

use bridge_chain_client::EthersChainClient;
use bridge_relayer_config::{BridgeRelayerConfig, NetworkConfig};
use bridge_relayer_store::{Prefix, SledStore};
use bridge_relayer_utils::metric::Metrics;

/// RelayerContext contains Relayer's configuration and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: BridgeRelayerConfig,
    /// Broadcasts a shutdown signal to all active tasks.
    ///
    /// The initial `shutdown` trigger is provided by the `run` caller. When a
    /// task is spawned, it is passed a broadcast receiver handle. When a
    /// graceful shutdown is initiated, a `()` value is sent via the
    /// broadcast::Sender. Each active task receives it, reaches a safe
    /// terminal state, and completes.
    notify_shutdown: broadcast::Sender<()>,
    /// Represents the metrics for the relayer
    pub metrics: Metrics,
    store: SledStore,
}

impl std::fmt::Debug for RelayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RelayerContext {
    /// Creates a new RelayerContext.
    pub fn new(
        config: BridgeRelayerConfig,
        store: SledStore,
    ) -> bridge_relayer_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let metrics = Metrics::new()?;
        Ok(Self {
            config,
            notify_shutdown,
            metrics,
            store,
        })
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed tasks/connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// Returns the store of the relayer.
    pub fn store(&self) -> &SledStore {
        &self.store
    }

    /// The network the proposals of `prefix` are read from: `home` proposals
    /// come from the home network.
    pub fn network(&self, prefix: Prefix) -> &NetworkConfig {
        match prefix {
            Prefix::Home => &self.config.home,
            Prefix::Foreign => &self.config.foreign,
        }
    }

    /// Sets up and returns the wallet of the relayer on the network of
    /// `prefix`.
    pub fn evm_wallet(
        &self,
        prefix: Prefix,
    ) -> bridge_relayer_utils::Result<LocalWallet> {
        let network = self.network(prefix);
        let private_key = network
            .private_key
            .as_ref()
            .ok_or(bridge_relayer_utils::Error::MissingSecrets)?;
        let wallet = LocalWallet::from_bytes(private_key.as_bytes())?
            .with_chain_id(network.chain_id);
        Ok(wallet)
    }

    /// The account the relayer signs with on the network of `prefix`, if a
    /// key is configured.
    pub fn relayer_address(&self, prefix: Prefix) -> Option<Address> {
        self.evm_wallet(prefix).ok().map(|w| w.address())
    }

    /// Returns a client for the network of `prefix`. It can submit
    /// transactions when the network has a private key.
    pub fn chain_client(
        &self,
        prefix: Prefix,
    ) -> bridge_relayer_utils::Result<EthersChainClient> {
        let network = self.network(prefix);
        let client = EthersChainClient::new(network.http_endpoint.as_url())?;
        match self.evm_wallet(prefix) {
            Ok(wallet) => Ok(client.with_wallet(wallet)),
            Err(bridge_relayer_utils::Error::MissingSecrets) => {
                tracing::debug!(
                    network = %network.name,
                    "no private key, using a read only client",
                );
                Ok(client)
            }
            Err(e) => Err(e),
        }
    }
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the server
/// should shutdown.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Callers may query for whether the shutdown signal has been
/// received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,
    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Returns `true` if the shutdown signal has been received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }
        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;
        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
