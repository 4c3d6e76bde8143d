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
//! # Relayer Store Module 🕸️
//!
//! A module for managing the storage of the relayer.
//!
//! ## Overview
//!
//! The relayer store keeps, per bridge direction, the block cursor of the
//! chain watcher and an append-only index of proposals. Every proposal also
//! sits in exactly one tag bucket (`unsigned`, `pending` or `signed`) at the
//! same sequence number as its index entry, which is how the signer tracks the
//! workflow state of a proposal without rewriting it.
//!
//! Every mutation touching more than one key runs as a single atomic batch.
use std::fmt::Display;
use std::str::FromStr;

use ethers::types::{Bytes, H256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use bridge_relayer_utils::Result;

/// Key layout shared by the backends.
pub mod keys;
/// A module for managing in-memory storage of the relayer.
pub mod mem;
/// A module for setting up and managing a [Sled](https://sled.rs)-based database.
#[cfg(feature = "sled")]
pub mod sled;

/// A store that uses [`sled`](https://sled.rs) as the backend.
#[cfg(feature = "sled")]
pub use self::sled::SledStore;
/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;

/// The index every proposal of a direction is appended to.
pub const PROPOSAL_INDEX: &str = "proposal_1";
/// Tag of proposals that were never submitted.
pub const UNSIGNED_TAG: &str = "unsigned";
/// Tag of proposals whose suggest transaction awaits a receipt.
pub const PENDING_TAG: &str = "pending";
/// Terminal tag of confirmed proposals.
pub const SIGNED_TAG: &str = "signed";
/// Key of the watcher cursor: the next block height to scan.
pub const CURSOR_KEY: &str = "fromBlock";

/// A proposal id: keccak256 of the source transaction hash, the destination
/// call data and a zero suffix byte.
pub type ProposalId = H256;

/// The bridge direction a stored value belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Prefix {
    /// Events seen on the home chain, to be issued on the foreign chain.
    Home,
    /// Events seen on the foreign chain, to be unlocked on the home chain.
    Foreign,
}

impl Prefix {
    /// Both directions, home first.
    pub const ALL: [Prefix; 2] = [Prefix::Home, Prefix::Foreign];

    /// The key prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Prefix::Home => "home",
            Prefix::Foreign => "foreign",
        }
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prefix {
    type Err = bridge_relayer_utils::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "home" => Ok(Prefix::Home),
            "foreign" => Ok(Prefix::Foreign),
            other => Err(bridge_relayer_utils::Error::InvalidDirection(
                other.to_owned(),
            )),
        }
    }
}

/// The immutable payload of a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Hash of the source chain transaction that emitted the event.
    pub hash: H256,
    /// ABI encoded call for the destination chain.
    pub calldata: Bytes,
    /// Source block number.
    pub block: u64,
}

/// The value of a tag entry.
///
/// `true` marks a proposal that still needs a signature, a transaction hash
/// marks a submitted one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    /// A plain marker.
    Flag(bool),
    /// The hash of the suggest transaction, as a `0x` prefixed hex string.
    TxHash(String),
}

impl TagValue {
    /// The marker of a proposal awaiting its first submission.
    pub fn unsigned() -> Self {
        TagValue::Flag(true)
    }

    /// The value recorded once the suggest transaction was sent.
    pub fn submitted(tx_hash: H256) -> Self {
        TagValue::TxHash(format!("{tx_hash:#x}"))
    }

    /// The transaction hash, if the value is a well formed 32 byte hash.
    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            TagValue::TxHash(s) if is_tx_hash_str(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Whether the value has the shape of a transaction hash, which is what
    /// classifies an entry as pending.
    pub fn is_tx_hash(&self) -> bool {
        self.tx_hash().is_some()
    }
}

fn is_tx_hash_str(s: &str) -> bool {
    s.strip_prefix("0x").map_or(false, |hex| {
        hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit())
    })
}

/// An inclusive range over sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeQuery {
    /// Lowest sequence, inclusive.
    pub low: u64,
    /// Highest sequence, inclusive. `None` is unbounded.
    pub high: Option<u64>,
    /// Walk from `high` down to `low`.
    pub reverse: bool,
    /// Stop after that many entries.
    pub limit: Option<usize>,
}

impl Default for RangeQuery {
    fn default() -> Self {
        Self::all()
    }
}

impl RangeQuery {
    /// Every sequence, in ascending order.
    pub fn all() -> Self {
        Self {
            low: 0,
            high: None,
            reverse: false,
            limit: None,
        }
    }

    /// Sets the lower bound.
    pub fn from(mut self, low: u64) -> Self {
        self.low = low;
        self
    }

    /// Sets the upper bound.
    pub fn to(mut self, high: u64) -> Self {
        self.high = Some(high);
        self
    }

    /// Walks the range in descending order.
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Caps the number of returned entries.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Result of appending a proposal to an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The proposal was new and got this sequence.
    Appended {
        /// The assigned sequence number.
        sequence: u64,
    },
    /// The proposal id was already indexed; nothing was written.
    Duplicate {
        /// The sequence assigned when the proposal was first seen.
        sequence: u64,
    },
}

impl AppendOutcome {
    /// The sequence of the proposal, new or existing.
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Appended { sequence } | Self::Duplicate { sequence } => {
                *sequence
            }
        }
    }

    /// Whether nothing was written.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// An index entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Position in the index, starting at 1.
    pub sequence: u64,
    /// The proposal stored at that position.
    pub id: ProposalId,
}

/// A tag bucket entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEntry {
    /// Same sequence as the index entry of the proposal.
    pub sequence: u64,
    /// The tag value.
    pub value: TagValue,
}

/// An index entry joined with the proposal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Datum {
    /// Position in the index.
    #[serde(skip)]
    pub sequence: u64,
    /// The proposal id.
    pub key: ProposalId,
    /// The payload, `None` if it went missing.
    pub value: Option<Proposal>,
}

/// A tag entry joined with its index entry and payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatumWithTag {
    /// Position in the index and in the tag bucket.
    pub sequence: u64,
    /// The bucket the entry was read from.
    pub tag: String,
    /// The value of the tag entry.
    pub tag_value: TagValue,
    /// The proposal id.
    pub key: ProposalId,
    /// The payload, `None` if it went missing.
    pub value: Option<Proposal>,
}

/// One page of proposals, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// The proposals of the page.
    pub rows: Vec<Datum>,
    /// Length of the whole index.
    pub count: u64,
}

/// ProposalStore is the persistence of the bridge: plain values, an
/// append-only proposal index and the tag buckets.
pub trait ProposalStore: Clone + Send + Sync {
    /// Unconditionally stores `value` under `prefix:key`.
    fn set_value<T: Serialize>(
        &self,
        prefix: Prefix,
        key: &str,
        value: &T,
    ) -> Result<()>;

    /// Reads the value under `prefix:key`.
    fn get_value<T: DeserializeOwned>(
        &self,
        prefix: Prefix,
        key: &str,
    ) -> Result<Option<T>>;

    /// Atomically appends `id` to `index`, stores its payload and, when `tag`
    /// is given, puts it in that bucket with the [`TagValue::unsigned`] marker.
    ///
    /// Appending an id that is already indexed writes nothing and returns
    /// [`AppendOutcome::Duplicate`].
    fn append_indexed(
        &self,
        prefix: Prefix,
        id: ProposalId,
        index: &str,
        payload: &Proposal,
        tag: Option<&str>,
    ) -> Result<AppendOutcome>;

    /// Atomically moves the entry at `sequence` from `old_tag` to `new_tag`.
    /// The value is carried over unless `value` overrides it.
    ///
    /// Fails with `TagEntryNotFound` when `old_tag` has no such entry.
    fn move_tag(
        &self,
        prefix: Prefix,
        old_tag: &str,
        new_tag: &str,
        sequence: u64,
        value: Option<&TagValue>,
    ) -> Result<()>;

    /// Length of `index`, 0 if it was never written.
    fn get_count(&self, prefix: Prefix, index: &str) -> Result<u64>;

    /// Scans `index` over the sequences of `query`.
    fn range_by_index(
        &self,
        prefix: Prefix,
        index: &str,
        query: &RangeQuery,
    ) -> Result<Vec<IndexEntry>>;

    /// Scans the `tag` bucket over the sequences of `query`.
    fn range_by_tag(
        &self,
        prefix: Prefix,
        tag: &str,
        query: &RangeQuery,
    ) -> Result<Vec<TagEntry>>;

    /// The sequence `id` was appended at.
    fn sequence_of(
        &self,
        prefix: Prefix,
        index: &str,
        id: &ProposalId,
    ) -> Result<Option<u64>>;

    /// Reads the payload of a proposal.
    fn get_proposal(
        &self,
        prefix: Prefix,
        id: &ProposalId,
    ) -> Result<Option<Proposal>> {
        self.get_value(prefix, &format!("{id:#x}"))
    }

    /// The index entry at `sequence` joined with its payload.
    fn query(
        &self,
        prefix: Prefix,
        index: &str,
        sequence: u64,
    ) -> Result<Option<Datum>> {
        let query = RangeQuery::all().from(sequence).to(sequence).limit(1);
        Ok(self.query_all(prefix, index, &query)?.pop())
    }

    /// The index entries of `query` joined with their payloads.
    fn query_all(
        &self,
        prefix: Prefix,
        index: &str,
        query: &RangeQuery,
    ) -> Result<Vec<Datum>> {
        self.range_by_index(prefix, index, query)?
            .into_iter()
            .map(|entry| {
                Ok(Datum {
                    sequence: entry.sequence,
                    value: self.get_proposal(prefix, &entry.id)?,
                    key: entry.id,
                })
            })
            .collect()
    }

    /// The `tag` entries of `query` joined with the index and the payloads.
    /// Tag entries whose index entry is missing are skipped.
    fn query_all_by_tag(
        &self,
        prefix: Prefix,
        index: &str,
        tag: &str,
        query: &RangeQuery,
    ) -> Result<Vec<DatumWithTag>> {
        let mut rows = Vec::new();
        for entry in self.range_by_tag(prefix, tag, query)? {
            match self.query(prefix, index, entry.sequence)? {
                Some(datum) => rows.push(DatumWithTag {
                    sequence: entry.sequence,
                    tag: tag.to_owned(),
                    tag_value: entry.value,
                    key: datum.key,
                    value: datum.value,
                }),
                None => {
                    tracing::warn!(
                        %prefix,
                        tag,
                        sequence = entry.sequence,
                        "tag entry without index entry",
                    );
                }
            }
        }
        Ok(rows)
    }

    /// Newest-first pagination: skips the `offset` newest proposals and
    /// returns at most `size` of the following ones.
    fn page(
        &self,
        prefix: Prefix,
        index: &str,
        offset: u64,
        size: u64,
    ) -> Result<Page> {
        let count = self.get_count(prefix, index)?;
        let from = count.saturating_sub(offset);
        let end = from.saturating_sub(size);
        let rows = if from == 0 || size == 0 {
            Vec::new()
        } else {
            let query = RangeQuery::all().from(end + 1).to(from).reversed();
            self.query_all(prefix, index, &query)?
        };
        Ok(Page { rows, count })
    }

    /// The next block the watcher of `prefix` has to scan, or `default` when
    /// it never ran.
    fn get_cursor(&self, prefix: Prefix, default: u64) -> Result<u64> {
        Ok(self.get_value(prefix, CURSOR_KEY)?.unwrap_or(default))
    }

    /// Persists the cursor of `prefix`. The cursor never moves backwards: a
    /// lower height is ignored. Returns the stored cursor.
    fn set_cursor(&self, prefix: Prefix, height: u64) -> Result<u64> {
        match self.get_value::<u64>(prefix, CURSOR_KEY)? {
            Some(current) if current > height => {
                tracing::warn!(
                    %prefix,
                    current,
                    height,
                    "refusing to move the cursor backwards",
                );
                Ok(current)
            }
            _ => {
                self.set_value(prefix, CURSOR_KEY, &height)?;
                Ok(height)
            }
        }
    }

    /// Up to `limit` proposals of `prefix` that are not signed yet, oldest
    /// first, from both the `unsigned` and the `pending` buckets.
    fn unfinished(
        &self,
        prefix: Prefix,
        limit: usize,
    ) -> Result<Vec<DatumWithTag>> {
        let query = RangeQuery::all().limit(limit);
        let mut rows =
            self.query_all_by_tag(prefix, PROPOSAL_INDEX, UNSIGNED_TAG, &query)?;
        rows.extend(self.query_all_by_tag(
            prefix,
            PROPOSAL_INDEX,
            PENDING_TAG,
            &query,
        )?);
        rows.sort_by_key(|row| row.sequence);
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod scenarios;
