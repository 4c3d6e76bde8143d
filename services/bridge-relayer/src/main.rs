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

//! Bridge Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

use tokio::signal::unix;

use bridge_relayer::service::{build_axum_services, ignite};
use bridge_relayer_config::cli::{create_store, load_config, setup_logger, Opts};
use bridge_relayer_context::RelayerContext;
use bridge_relayer_utils::probe;

/// The main entry point for the relayer.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose, "bridge_relayer")?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // configuration errors end the process here, never mid-run.
    let config = load_config(args.config_dir.clone())?;
    config.verify()?;

    // persistent storage for the relayer
    let store = create_store(&args)?;

    // The RelayerContext takes a configuration, and populates objects that are needed
    // throughout the lifetime of the relayer, like the clients of both chains.
    let ctx = RelayerContext::new(config, store)?;

    let server_handle = if ctx.config.features.query_api {
        let ctx = ctx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = build_axum_services(ctx).await {
                tracing::error!("Query API stopped: {}", e);
            }
        }))
    } else {
        None
    };

    // start all background services.
    // this does not block, will fire the services on background tasks.
    let scheduler_handle = ignite(&ctx)?;
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true
    );
    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
        },
    }

    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        shutdown = true
    );
    tracing::warn!("Shutting down...");
    // send shutdown signal to all of the application.
    ctx.shutdown();
    let drained = tokio::time::timeout(Duration::from_secs(1), async {
        let _ = scheduler_handle.await;
        if let Some(server) = server_handle {
            let _ = server.await;
        }
    })
    .await;
    if drained.is_err() {
        tracing::warn!("Background tasks did not stop in time");
    }
    let flushed = ctx.store().flush()?;
    tracing::debug!(bytes = flushed, "store flushed");
    tracing::info!("Clean Exit ..");
    Ok(())
}
