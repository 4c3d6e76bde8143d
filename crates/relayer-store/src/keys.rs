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

//! Key layout of the proposal store.
//!
//! Every key is an UTF-8 string made of `:` separated parts:
//!
//! | key                             | value                         |
//! |---------------------------------|-------------------------------|
//! | `prefix:key`                    | arbitrary value (cursor, ...) |
//! | `prefix:<id>`                   | proposal payload              |
//! | `prefix:index`                  | index length                  |
//! | `prefix:index:<seq>`            | proposal id                   |
//! | `prefix:index-id:<id>`          | sequence of the id            |
//! | `prefix:tag:<seq>`              | tag value                     |
//!
//! Sequences are zero padded to [`SEQUENCE_WIDTH`] digits so lexicographic
//! and numeric order coincide. `-` sorts before `:`, which keeps the reverse
//! lookup keys out of the index ranges.

use bridge_relayer_utils::Error;

use crate::{Prefix, ProposalId, RangeQuery};

/// Width of a padded sequence number, enough for any `u64`.
pub const SEQUENCE_WIDTH: usize = 20;

/// Upper bound sorting after every padded sequence.
pub const INFINITY: &str = "~";

const SEPARATOR: char = ':';

/// `prefix:key`
pub fn plain(prefix: Prefix, key: &str) -> String {
    format!("{prefix}{SEPARATOR}{key}")
}

/// `prefix:<id>`, where the payload of a proposal lives.
pub fn payload(prefix: Prefix, id: &ProposalId) -> String {
    plain(prefix, &format!("{id:#x}"))
}

/// `prefix:index-id:<id>`, the reverse lookup from id to sequence.
pub fn reverse(prefix: Prefix, index: &str, id: &ProposalId) -> String {
    format!("{prefix}{SEPARATOR}{index}-id{SEPARATOR}{id:#x}")
}

/// `prefix:namespace:<padded sequence>`, used for both index and tag entries.
pub fn entry(prefix: Prefix, namespace: &str, sequence: u64) -> String {
    format!(
        "{prefix}{SEPARATOR}{namespace}{SEPARATOR}{sequence:0width$}",
        width = SEQUENCE_WIDTH
    )
}

/// Inclusive `(start, end)` key bounds of a range query, or `None` when the
/// range is empty.
pub fn bounds(
    prefix: Prefix,
    namespace: &str,
    query: &RangeQuery,
) -> Option<(String, String)> {
    let start = entry(prefix, namespace, query.low);
    let end = match query.high {
        Some(high) if high < query.low => return None,
        Some(high) => entry(prefix, namespace, high),
        None => format!("{prefix}{SEPARATOR}{namespace}{SEPARATOR}{INFINITY}"),
    };
    Some((start, end))
}

/// Recovers the sequence number from an index or tag entry key.
pub fn sequence_of(key: &[u8]) -> crate::Result<u64> {
    std::str::from_utf8(key)
        .ok()
        .and_then(|k| k.rsplit(SEPARATOR).next())
        .and_then(|s| s.parse().ok())
        .ok_or(Error::Generic("corrupted sequence key in the proposal store"))
}
