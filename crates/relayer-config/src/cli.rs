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

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories_next::ProjectDirs;
use structopt::StructOpt;

use crate::BridgeRelayerConfig;

/// Package identifier, where the default configuration & database are defined.
/// If the user does not start the relayer with the `--config-dir`
/// it will default to read from the default location depending on the OS.
pub const PACKAGE_ID: [&str; 3] = ["tools", "bridge", "bridge-relayer"];

/// The Bridge Relayer Command-line tool
///
/// Start the relayer from a config directory:
///
/// $ bridge-relayer -vvv -c <CONFIG_DIR_PATH>
#[derive(StructOpt, Debug, Default)]
#[structopt(name = "Bridge Relayer")]
pub struct Opts {
    /// A level of verbosity, and can be used multiple times
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: i32,
    /// Directory that contains configration files.
    #[structopt(
        short = "c",
        long = "config-dir",
        value_name = "PATH",
        parse(from_os_str)
    )]
    pub config_dir: Option<PathBuf>,
    /// Create the Database Store in a temporary directory.
    /// and will be deleted when the process exits.
    #[structopt(long)]
    pub tmp: bool,
}

/// Loads the configuration from the given directory, or from the default
/// config directory of the OS when none is given.
pub fn load_config<P>(
    config_dir: Option<P>,
) -> Result<BridgeRelayerConfig, anyhow::Error>
where
    P: AsRef<Path>,
{
    tracing::debug!("Getting default dirs for bridge relayer");
    let path = match config_dir {
        Some(p) => p.as_ref().to_path_buf(),
        None => project_dirs()?.config_dir().to_path_buf(),
    };
    // return an error if the path is not a directory.
    if !path.is_dir() {
        return Err(anyhow::anyhow!("{} is not a directory", path.display()));
    }
    tracing::trace!("Loading Config from {} ..", path.display());
    let v = crate::utils::load(path)?;
    tracing::trace!("Config loaded..");
    Ok(v)
}

/// Maps the number of `-v` flags to a log level.
pub fn log_level(verbosity: i32) -> tracing::Level {
    use tracing::Level;
    match verbosity {
        i32::MIN..=0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Sets up the logger for the relayer, based on the verbosity level passed in.
/// `target` is the crate whose logs follow the verbosity, the rest of the
/// filter comes from `RUST_LOG`.
pub fn setup_logger(verbosity: i32, target: &str) -> anyhow::Result<()> {
    let log_level = log_level(verbosity);
    let directive = format!("{target}={log_level}")
        .parse()
        .context("invalid log directive")?;
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(directive);
    let logger = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter);
    // if we are not compiling for integration tests, we should use pretty logs
    #[cfg(not(feature = "integration-tests"))]
    let logger = logger.pretty();
    // otherwise, we should use json, which is easy to parse.
    #[cfg(feature = "integration-tests")]
    let logger = logger.json().flatten_event(true).with_current_span(false);

    logger
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set up the logger: {e}"))?;
    Ok(())
}

/// Creates the sled store of the relayer: a temporary one with `--tmp`,
/// otherwise `store/` next to the config directory.
pub fn create_store(
    opts: &Opts,
) -> anyhow::Result<bridge_relayer_store::SledStore> {
    // check if we shall use the temp dir.
    if opts.tmp {
        tracing::debug!("Using temp dir for store");
        let store = bridge_relayer_store::SledStore::temporary()?;
        return Ok(store);
    }
    let db_path = store_path(opts)?;
    tracing::debug!("Opening store at {}", db_path.display());
    let store = bridge_relayer_store::SledStore::open(db_path)?;
    Ok(store)
}

fn store_path(opts: &Opts) -> anyhow::Result<PathBuf> {
    let path = match opts.config_dir.as_ref() {
        Some(p) => match p.parent() {
            Some(parent) => parent.join("store"),
            None => p.join("store"),
        },
        None => project_dirs()?.data_local_dir().join("store"),
    };
    Ok(path)
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from(PACKAGE_ID[0], PACKAGE_ID[1], PACKAGE_ID[2])
        .context("failed to get config")
}
