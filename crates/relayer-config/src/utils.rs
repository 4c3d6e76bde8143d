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

use config::{Config, File};

use crate::BridgeRelayerConfig;

/// A helper function that will search for all config files in the given directory and return them as a vec
/// of the paths.
///
/// Supported file extensions are:
/// - `.toml`.
/// - `.json`.
pub fn search_config_files<P: AsRef<Path>>(
    base_dir: P,
) -> bridge_relayer_utils::Result<Vec<PathBuf>> {
    // A pattern that covers all toml or json files in the config directory and subdirectories.
    let toml_pattern = format!("{}/**/*.toml", base_dir.as_ref().display());
    let json_pattern = format!("{}/**/*.json", base_dir.as_ref().display());
    tracing::trace!(
        "Loading config files from {} and {}",
        toml_pattern,
        json_pattern
    );
    let toml_files = glob::glob(&toml_pattern)?;
    let json_files = glob::glob(&json_pattern)?;
    toml_files
        .chain(json_files)
        .map(|v| v.map_err(bridge_relayer_utils::Error::from))
        .collect()
}

/// Try to parse the [`BridgeRelayerConfig`] from the given config file(s).
pub fn parse_from_files(
    files: &[PathBuf],
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    let mut builder = Config::builder();
    for config_file in files {
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let format = match ext {
            "toml" => config::FileFormat::Toml,
            "json" => config::FileFormat::Json,
            _ => {
                tracing::warn!("Unknown file extension: {}", ext);
                continue;
            }
        };
        builder = builder
            .add_source(File::from(config_file.as_path()).format(format));
    }

    // also merge in the environment (with a prefix of BRIDGE).
    let builder = builder
        .add_source(config::Environment::with_prefix("BRIDGE").separator("_"));
    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    match serde_path_to_error::deserialize(cfg) {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// Load the configuration files and
///
/// Returns `Ok(BridgeRelayerConfig)` on success, or an error on failure.
///
/// it is the same as using the [`search_config_files`] and [`parse_from_files`] functions combined.
pub fn load<P: AsRef<Path>>(
    path: P,
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    parse_from_files(&search_config_files(path)?)
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(
    mut config: BridgeRelayerConfig,
) -> bridge_relayer_utils::Result<BridgeRelayerConfig> {
    tracing::trace!("Checking configration sanity ...");
    for network in [&mut config.home, &mut config.foreign] {
        network.net_type = network.net_type.to_lowercase();
        if network.max_blocks_per_step == 0 {
            tracing::warn!(
                network = %network.name,
                "!!WARNING!!: max-blocks-per-step is 0, using 1 instead",
            );
            network.max_blocks_per_step = 1;
        }
        if network.gas_price == 0 && config.features.sign {
            tracing::warn!(
                network = %network.name,
                "!!WARNING!!: gas-price is 0, suggest transactions may never be mined",
            );
        }
    }
    if config.home.chain_id == config.foreign.chain_id {
        tracing::warn!(
            chain_id = config.home.chain_id,
            "!!WARNING!!: home and foreign share the same chain id",
        );
    }
    if config.features.sign && !config.features.watch {
        tracing::warn!(
            "!!WARNING!!: signing is enabled without watching, only proposals \
            already stored will be signed",
        );
    }
    if config.tick_timeout < config.interval {
        tracing::warn!(
            "!!WARNING!!: tick-timeout is shorter than the interval, slow \
            ticks will be abandoned before the next firing",
        );
    }

    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = r#"
port = 3001
interval = 5

[home]
name = "home"
http-endpoint = "http://localhost:8545"
net-type = "ETH"
chain-id = 1
token-contract = "0x0000000000000000000000000000000000000001"
multi-sign-contract = "0x0000000000000000000000000000000000000002"
gas-price = 1000000000
private-key = "0x000000000000000000000000000000000000000000000000000000000000000a"
"#;

    const FOREIGN: &str = r#"{
  "foreign": {
    "name": "foreign",
    "http-endpoint": "http://localhost:8546",
    "net-type": "poa",
    "chain-id": 2,
    "token-contract": "0x0000000000000000000000000000000000000003",
    "multi-sign-contract": "0x0000000000000000000000000000000000000004",
    "from-height": 42,
    "private-key": "0x000000000000000000000000000000000000000000000000000000000000000b"
  }
}"#;

    #[test]
    fn merges_toml_and_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.toml"), MAIN).unwrap();
        std::fs::create_dir(dir.path().join("networks")).unwrap();
        std::fs::write(dir.path().join("networks/foreign.json"), FOREIGN)
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = search_config_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let config = parse_from_files(&files).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.interval, 5);
        assert_eq!(config.signer_batch, 30);
        assert_eq!(config.home.net_type, "eth");
        assert_eq!(config.home.confirmations(), 12);
        assert_eq!(config.home.gas_price, 1_000_000_000);
        assert_eq!(config.foreign.from_height, 42);
        assert_eq!(config.foreign.confirmations(), 0);
        assert!(config.verify().is_ok());
    }

    #[test]
    fn reports_the_failing_path() {
        let dir = tempfile::tempdir().unwrap();
        let broken = MAIN.replace("chain-id = 1", "chain-id = \"one\"");
        std::fs::write(dir.path().join("main.toml"), broken).unwrap();
        std::fs::write(dir.path().join("foreign.json"), FOREIGN).unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("chain-id"), "{err}");
    }

    #[test]
    fn example_configs_are_correct() {
        let config_dir =
            Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");
        let dirs = glob::glob(config_dir.join("*").to_str().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect::<Vec<_>>();
        assert!(!dirs.is_empty(), "No config directories found");
        for dir in dirs {
            let _ = dotenv::from_path(dir.join(".env.example"));
            if let Err(e) = load(&dir) {
                panic!("Failed to parse config file in directory: {dir:?} with error: {e}");
            }
        }
    }
}
