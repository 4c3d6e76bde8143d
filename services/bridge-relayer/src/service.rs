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

//! # Relayer Service Module 🕸️
//!
//! A module for starting the long-running tasks of the relayer.
//!
//! ## Overview
//!
//! Services are tasks which the relayer constantly runs throughout its
//! lifetime: the chain watchers and the proposal signers, driven by the
//! [`Scheduler`], and the query API.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bridge_chain_client::EthersChainClient;
use bridge_chain_watcher::{
    ChainWatcher, ForeignBridge, HomeBridge, WatcherSettings,
};
use bridge_proposal_signer::{ProposalSigner, SignerSettings};
use bridge_relayer_config::NetworkConfig;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_handlers::routes::{
    handle_height, handle_metric_info, handle_proposals, handle_relayer_info,
    handle_unsigned_proposals,
};
use bridge_relayer_store::{Prefix, SledStore};
use bridge_scheduler::{PeriodicTask, Scheduler};

/// Type alias for the client of a network
pub type Client = Arc<EthersChainClient>;
/// Type alias for [Sled](https://sled.rs)-based database store
pub type Store = SledStore;

/// Routes of the query API, relative to `/api/v1`.
pub fn api_routes(ctx: Arc<RelayerContext>) -> Router {
    Router::new()
        .route("/proposals/:kind", get(handle_proposals))
        .route("/proposals/:kind/unsigned", get(handle_unsigned_proposals))
        .route("/height/:kind", get(handle_height))
        .route("/info", get(handle_relayer_info))
        .route("/metrics", get(handle_metric_info))
        .with_state(ctx)
}

/// Serves the query API on the configured port until the shutdown signal.
pub async fn build_axum_services(ctx: RelayerContext) -> crate::Result<()> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(Any);
    let app = Router::new()
        .nest("/api/v1", api_routes(Arc::new(ctx.clone())))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .into_make_service_with_connect_info::<SocketAddr>();

    let socket_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, ctx.config.port));
    tracing::info!("Starting the query API on {}", socket_addr);
    let mut shutdown = ctx.shutdown_signal();
    axum::Server::bind(&socket_addr)
        .serve(app)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await?;
    Ok(())
}

/// Builds the workers enabled by the configuration, in the order they are
/// phased on the cadence: home watcher, home signer, foreign watcher and
/// foreign signer.
///
/// The signer of a chain handles the proposals headed to it, so the home
/// signer works on the `foreign` proposals and the other way around.
pub fn workers(
    ctx: &RelayerContext,
) -> crate::Result<Vec<Arc<dyn PeriodicTask>>> {
    let features = ctx.config.features;
    let mut tasks: Vec<Arc<dyn PeriodicTask>> = Vec::new();
    for (network, watched) in [
        (&ctx.config.home, Prefix::Home),
        (&ctx.config.foreign, Prefix::Foreign),
    ] {
        let client: Client = Arc::new(ctx.chain_client(watched)?);
        tracing::debug!(
            "Starting Background Services for ({}) chain.",
            network.name
        );
        if features.watch {
            let settings = watcher_settings(network);
            let name = format!("{}-watch", watched);
            let store = ctx.store().clone();
            let metrics = ctx.metrics.clone();
            let task: Arc<dyn PeriodicTask> = match watched {
                Prefix::Home => {
                    let direction =
                        HomeBridge::new(network.multi_sign_contract);
                    Arc::new(ChainWatcher::new(
                        name,
                        direction,
                        client.clone(),
                        store,
                        settings,
                        metrics,
                    ))
                }
                Prefix::Foreign => Arc::new(ChainWatcher::new(
                    name,
                    ForeignBridge,
                    client.clone(),
                    store,
                    settings,
                    metrics,
                )),
            };
            tasks.push(task);
        }
        if features.sign {
            let signed = match watched {
                Prefix::Home => Prefix::Foreign,
                Prefix::Foreign => Prefix::Home,
            };
            tasks.push(Arc::new(ProposalSigner::new(
                format!("{}-sign", watched),
                signed,
                client,
                ctx.store().clone(),
                signer_settings(network, ctx.config.signer_batch),
                ctx.metrics.clone(),
            )));
        }
    }
    Ok(tasks)
}

fn watcher_settings(network: &NetworkConfig) -> WatcherSettings {
    WatcherSettings {
        contract: network.token_contract,
        from_height: network.from_height,
        max_blocks_per_step: network.max_blocks_per_step,
        confirmations: network.confirmations(),
        print_progress_interval: network.print_progress_interval(),
        explorer: network.explorer.clone(),
    }
}

fn signer_settings(network: &NetworkConfig, batch: usize) -> SignerSettings {
    SignerSettings {
        multi_sign: network.multi_sign_contract,
        gas: network.gas_limit.into(),
        gas_price: network.gas_price.into(),
        batch,
        explorer: network.explorer.clone(),
    }
}

/// Starts all background services: every enabled worker is registered in a
/// [`Scheduler`] that runs on a background task until the shutdown signal.
///
/// This does not block.
pub fn ignite(
    ctx: &RelayerContext,
) -> crate::Result<tokio::task::JoinHandle<()>> {
    tracing::debug!(
        "Relayer configuration: {}",
        serde_json::to_string_pretty(&ctx.config)?
    );
    let mut scheduler = Scheduler::new(
        ctx.config.interval(),
        ctx.config.tick_timeout(),
        ctx.metrics.clone(),
    );
    for task in workers(ctx)? {
        scheduler.register(task);
    }
    if scheduler.schedules().is_empty() {
        tracing::warn!("Watching and signing are both disabled");
    }
    let mut shutdown = ctx.shutdown_signal();
    let handle = tokio::spawn(async move {
        scheduler.run(async move { shutdown.recv().await }).await;
    });
    Ok(handle)
}
