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
//! Shared building blocks of the bridge relayer: the error type used by every
//! crate in the workspace, prometheus metrics, probe targets and retry
//! policies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Provider};
use ethers::signers::LocalWallet;

pub mod clickable_link;

/// Metrics functionality
pub mod metric;
/// A module used for debugging relayer lifecycle, sync state, or other relayer state.
pub mod probe;
/// Retry functionality
pub mod retry;

/// An enum of all possible errors that could be encountered during the execution of the Bridge
/// Relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while iterating over a glob pattern.
    #[error(transparent)]
    GlobPattern(#[from] glob::PatternError),
    /// Error from Glob Iterator.
    #[error(transparent)]
    Glob(#[from] glob::GlobError),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Error in the underlying Http server.
    #[error(transparent)]
    Axum(#[from] axum::Error),
    /// HTTP Error
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    /// Error in Http Provider (ethers client).
    #[error(transparent)]
    EthersProvider(#[from] ethers::providers::ProviderError),
    /// Error while signing or sending a transaction through the signer middleware.
    #[error(transparent)]
    EthersSignerMiddleware(
        #[from]
        ethers::middleware::signer::SignerMiddlewareError<
            Provider<Http>,
            LocalWallet,
        >,
    ),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWalletError(#[from] ethers::signers::WalletError),
    /// ABI encoding or decoding error.
    #[error(transparent)]
    EthersAbi(#[from] ethers::abi::Error),
    /// Sled database error.
    #[error(transparent)]
    Sled(#[from] sled::Error),
    /// Sled transaction error.
    #[error(transparent)]
    SledTransaction(
        #[from] sled::transaction::TransactionError<std::io::Error>,
    ),
    /// Prometheus error.
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
    /// Error while parsing the config files.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Missing the relayer private key in the config of a signing network.
    #[error("Missing required private-key in the config")]
    MissingSecrets,
    /// No entry in the tag bucket at the requested sequence number.
    #[error("No `{tag}` entry at sequence {sequence} for `{prefix}`")]
    TagEntryNotFound {
        /// The direction prefix.
        prefix: String,
        /// The tag bucket that was expected to hold the entry.
        tag: String,
        /// The sequence number that was looked up.
        sequence: u64,
    },
    /// A log that could not be decoded into a proposal.
    #[error("Malformed log: {}", _0)]
    MalformedLog(String),
    /// Unknown bridge direction (neither `home2foreign` nor `foreign2home`).
    #[error("Invalid direction: {}", _0)]
    InvalidDirection(String),
}

impl Error {
    /// Whether this error is about the content of a single event rather than
    /// about the transport or the storage.
    ///
    /// Malformed events are skipped; every other error aborts the current tick
    /// so the same range is retried on the next one.
    pub fn is_malformed_event(&self) -> bool {
        matches!(self, Self::MalformedLog(_) | Self::EthersAbi(_))
    }
}

/// A type alias for the result for bridge relayer, that uses the `Error` enum.
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for HandlerError {
    fn from(value: Error) -> Self {
        HandlerError(StatusCode::INTERNAL_SERVER_ERROR, value.to_string())
    }
}

/// Error type for HTTP handlers
#[derive(Debug)]
pub struct HandlerError(
    /// HTTP status code for response
    pub StatusCode,
    /// Response message
    pub String,
);

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}
