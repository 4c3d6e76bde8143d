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

use axum::http::StatusCode;
use serde::Deserialize;

use bridge_relayer_store::Prefix;
use bridge_relayer_utils::HandlerError;

/// Module for handling the proposal listings
mod proposals;
pub use proposals::*;

/// Module for handling the watcher cursors
mod height;
pub use height::*;

/// Module for handling relayer metric API
mod metric;
pub use metric::*;

/// Module for handling relayer info API
mod info;
pub use info::*;

/// Page size used when the request has none.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Maps a direction of the API, like `home2foreign`, to the prefix its
/// proposals are stored under.
pub fn parse_kind(kind: &str) -> Result<Prefix, HandlerError> {
    match kind {
        "home2foreign" => Ok(Prefix::Home),
        "foreign2home" => Ok(Prefix::Foreign),
        other => {
            tracing::debug!(kind = other, "unknown direction");
            Err(HandlerError(
                StatusCode::FORBIDDEN,
                format!("Unknown direction: {other}"),
            ))
        }
    }
}

/// The raw `offset` and `size` query parameters.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageQuery {
    /// Newest proposals to skip.
    pub offset: Option<String>,
    /// Proposals per page.
    pub size: Option<String>,
}

impl PageQuery {
    /// Resolves the parameters. Missing, zero or non numeric values fall back
    /// to the defaults, negative ones are rejected.
    pub fn resolve(&self) -> Result<(u64, u64), HandlerError> {
        let offset = lenient_number(self.offset.as_deref(), 0)?;
        let size = lenient_number(self.size.as_deref(), DEFAULT_PAGE_SIZE)?;
        Ok((offset, size))
    }
}

fn lenient_number(raw: Option<&str>, default: u64) -> Result<u64, HandlerError> {
    let parsed = raw
        .map(str::trim)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|n| !n.is_nan() && *n != 0.0);
    match parsed {
        None => Ok(default),
        Some(n) if n < 0.0 => Err(HandlerError(
            StatusCode::FORBIDDEN,
            "offset and size must not be negative".to_string(),
        )),
        // `as` saturates, so huge values select everything.
        Some(n) => Ok(n.trunc() as u64),
    }
}
